//! `POST /api/ai/chat`: relay a message to the AI assistant.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use civicalex_core::store::LegalStore;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::AppState;

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
  #[serde(default)]
  pub message: String,
}

fn json_error(status: StatusCode, message: &str) -> Response {
  (status, Json(json!({ "error": message }))).into_response()
}

pub async fn chat<S>(
  State(state): State<AppState<S>>,
  Json(req): Json<ChatRequest>,
) -> Response
where
  S: LegalStore + Clone + Send + Sync + 'static,
{
  let message = req.message.trim();
  if message.is_empty() {
    return json_error(StatusCode::BAD_REQUEST, "Message is required");
  }
  if message.chars().count() > MAX_MESSAGE_CHARS {
    return json_error(StatusCode::BAD_REQUEST, "Message is too long");
  }

  match state.bridge.ask(message.to_owned()).await {
    Ok(reply) => Json(json!({ "reply": reply })).into_response(),
    Err(e) => {
      warn!(error = %e, "AI chat request failed");
      json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "The assistant is unavailable right now. Please try again later.",
      )
    }
  }
}
