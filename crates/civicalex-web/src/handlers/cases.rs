//! Case detail and lifecycle actions. Every action is scoped to the caller;
//! someone else's case is reported exactly like a missing one.

use axum::{
  Form, Json,
  extract::{Path, State},
  response::Redirect,
};
use chrono::Utc;
use civicalex_core::{
  case::{Case, CaseStatus, StatusForm, TimelineForm},
  document::{Document, DocumentFilter},
  store::LegalStore,
};
use serde::Serialize;
use tracing::info;

use crate::{
  AppState,
  auth::CurrentUser,
  error::{Error, Result},
  handlers::{parse_id, today},
  session::CsrfToken,
};

const NOT_FOUND: &str = "The requested case could not be found";

fn not_found() -> Error { Error::NotFound(NOT_FOUND.to_owned()) }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseView {
  pub case:       Case,
  pub documents:  Vec<Document>,
  pub statuses:   &'static [CaseStatus],
  pub csrf_token: String,
}

pub async fn detail<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  CsrfToken(csrf_token): CsrfToken,
  Path(id): Path<String>,
) -> Result<Json<CaseView>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case_id = parse_id(&id, NOT_FOUND)?;
  let case = state
    .store
    .get_case(case_id, me.user_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(not_found)?;
  let documents = state
    .store
    .find_active_documents(DocumentFilter {
      user_id: Some(me.user_id),
      case_id: Some(case_id),
      ..Default::default()
    })
    .await
    .map_err(Error::store)?;

  Ok(Json(CaseView {
    case,
    documents,
    statuses: CaseStatus::ALL,
    csrf_token,
  }))
}

pub async fn add_event<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
  Form(form): Form<TimelineForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case_id = parse_id(&id, NOT_FOUND)?;
  let entry = form.validate(today())?;
  if !state
    .store
    .append_timeline(case_id, me.user_id, entry)
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  Ok(Redirect::to(&format!("/cases/{case_id}")))
}

pub async fn change_status<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
  Form(form): Form<StatusForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case_id = parse_id(&id, NOT_FOUND)?;
  let status = form.parse::<CaseStatus>()?;
  if !state
    .store
    .set_case_status(case_id, me.user_id, status, Utc::now())
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  info!(user_id = %me.user_id, case_id = %case_id, %status, "case status changed");
  Ok(Redirect::to(&format!("/cases/{case_id}")))
}

pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case_id = parse_id(&id, NOT_FOUND)?;
  if !state
    .store
    .mark_case_notifications_read(case_id, me.user_id)
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  Ok(Redirect::to(&format!("/cases/{case_id}")))
}

pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case_id = parse_id(&id, NOT_FOUND)?;
  if !state
    .store
    .delete_case(case_id, me.user_id)
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  info!(user_id = %me.user_id, case_id = %case_id, "case deleted");
  Ok(Redirect::to("/dashboard"))
}
