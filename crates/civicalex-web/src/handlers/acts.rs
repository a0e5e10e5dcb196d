use axum::{
  Json,
  extract::{Path, State},
};
use civicalex_core::store::LegalStore;
use serde_json::{Value, json};

use crate::{
  AppState,
  acts::{ActDetail, ActKind},
  error::{Error, Result},
};

fn act_not_found() -> Error { Error::NotFound("The requested act could not be found".to_owned()) }

fn listing<S: LegalStore>(state: &AppState<S>, kind: ActKind, title: &str) -> Json<Value> {
  Json(json!({ "title": title, "acts": state.acts.list(kind) }))
}

pub async fn list_central<S>(State(state): State<AppState<S>>) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
{
  listing(&state, ActKind::Central, "Central Acts - CivicaLex")
}

pub async fn list_state<S>(State(state): State<AppState<S>>) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
{
  listing(&state, ActKind::State, "State Acts - CivicaLex")
}

pub async fn detail<S>(
  State(state): State<AppState<S>>,
  Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
{
  let kind: ActKind = kind.parse().map_err(|_| act_not_found())?;
  let id: u32 = id.parse().map_err(|_| act_not_found())?;
  let act = state.acts.get(kind, id).ok_or_else(act_not_found)?;
  Ok(Json(json!({
    "title": format!("{} - CivicaLex", act.name),
    "act":   ActDetail::new(act),
  })))
}
