//! Petition detail and lifecycle actions.

use axum::{
  Form, Json,
  extract::{Path, State},
  response::Redirect,
};
use chrono::Utc;
use civicalex_core::{
  case::StatusForm,
  document::{Document, DocumentFilter},
  petition::{Petition, PetitionStatus},
  store::LegalStore,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{Error, Result},
  handlers::{parse_id, today},
  session::CsrfToken,
};

const NOT_FOUND: &str = "The requested petition could not be found";

fn not_found() -> Error { Error::NotFound(NOT_FOUND.to_owned()) }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionView {
  pub petition:   Petition,
  pub documents:  Vec<Document>,
  pub statuses:   &'static [PetitionStatus],
  pub csrf_token: String,
}

pub async fn detail<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  CsrfToken(csrf_token): CsrfToken,
  Path(id): Path<String>,
) -> Result<Json<PetitionView>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let petition_id = parse_id(&id, NOT_FOUND)?;
  let petition = state
    .store
    .get_petition(petition_id, me.user_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(not_found)?;
  let documents = state
    .store
    .find_active_documents(DocumentFilter {
      user_id: Some(me.user_id),
      petition_id: Some(petition_id),
      ..Default::default()
    })
    .await
    .map_err(Error::store)?;

  Ok(Json(PetitionView {
    petition,
    documents,
    statuses: PetitionStatus::ALL,
    csrf_token,
  }))
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
  let petition_id = parse_id(&id, NOT_FOUND)?;
  let status = form.parse::<PetitionStatus>()?;
  if !state
    .store
    .set_petition_status(petition_id, me.user_id, status, Utc::now())
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  info!(user_id = %me.user_id, petition_id = %petition_id, %status, "petition status changed");
  Ok(Redirect::to(&format!("/petitions/{petition_id}")))
}

/// `Draft -> Submitted`. Submitting a petition that is already past draft is
/// a no-op, so a replayed request lands on the same page without touching the
/// filing date.
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let petition_id = parse_id(&id, NOT_FOUND)?;
  let submitted = state
    .store
    .submit_petition(petition_id, me.user_id, today())
    .await
    .map_err(Error::store)?;

  if submitted {
    info!(user_id = %me.user_id, petition_id = %petition_id, "petition submitted");
  } else {
    let exists = state
      .store
      .get_petition(petition_id, me.user_id)
      .await
      .map_err(Error::store)?;
    match exists {
      Some(p) => debug!(petition_id = %petition_id, status = %p.status, "submit ignored"),
      None => return Err(not_found()),
    }
  }
  Ok(Redirect::to(&format!("/petitions/{petition_id}")))
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
  let petition_id = parse_id(&id, NOT_FOUND)?;
  if !state
    .store
    .delete_petition(petition_id, me.user_id)
    .await
    .map_err(Error::store)?
  {
    return Err(not_found());
  }
  info!(user_id = %me.user_id, petition_id = %petition_id, "petition deleted");
  Ok(Redirect::to("/dashboard"))
}
