pub mod acts;
pub mod auth;
pub mod cases;
pub mod chat;
pub mod contact;
pub mod dashboard;
pub mod documents;
pub mod petitions;
pub mod profile;
pub mod search;

use axum::{Json, extract::State};
use civicalex_core::store::LegalStore;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::Error,
  session::{CsrfToken, RequestContext},
};

/// Parse a record id from the path. A malformed id is reported the same way
/// as a missing record.
pub(crate) fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, Error> {
  Uuid::parse_str(raw).map_err(|_| Error::NotFound(not_found.to_owned()))
}

pub(crate) fn today() -> chrono::NaiveDate { chrono::Utc::now().date_naive() }

pub async fn home<S>(ctx: RequestContext, CsrfToken(csrf_token): CsrfToken) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Json(json!({
    "title":         "CivicaLex",
    "authenticated": ctx.identity.is_some(),
    "csrfToken":     csrf_token,
  }))
}

pub async fn health<S>(State(state): State<AppState<S>>) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
{
  Json(json!({
    "status":    "ok",
    "aiBridge":  state.bridge.is_healthy(),
  }))
}

pub async fn not_found() -> Error { Error::NotFound("Page not found".to_owned()) }
