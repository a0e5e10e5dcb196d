//! The dashboard and the record-creating forms posted from it.

use axum::{
  Form, Json,
  extract::{Multipart, State},
  response::Redirect,
};
use chrono::NaiveDate;
use civicalex_core::{
  ValidationErrors,
  case::{Case, CaseForm, CaseStats},
  document::{Document, DocumentFilter},
  petition::{Petition, PetitionForm, PetitionStats},
  store::LegalStore,
  user::User,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  custody,
  error::{Error, Result},
  handlers::today,
  session::CsrfToken,
};

const RECENT: usize = 5;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingHearing {
  pub case_id:     Uuid,
  pub title:       String,
  pub court:       String,
  pub case_number: String,
  pub date:        NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
  pub user:              User,
  pub case_stats:        CaseStats,
  pub petition_stats:    PetitionStats,
  pub recent_cases:      Vec<Case>,
  pub recent_petitions:  Vec<Petition>,
  pub recent_documents:  Vec<Document>,
  pub upcoming_hearings: Vec<UpcomingHearing>,
  pub csrf_token:        String,
}

/// Hearings on or after `today` among `cases`, soonest first.
pub fn upcoming_hearings(cases: &[Case], today: NaiveDate) -> Vec<UpcomingHearing> {
  let mut hearings: Vec<UpcomingHearing> = cases
    .iter()
    .filter_map(|c| {
      let date = c.next_hearing.filter(|d| *d >= today)?;
      Some(UpcomingHearing {
        case_id: c.case_id,
        title: c.title.clone(),
        court: c.court.clone(),
        case_number: c.case_number.clone(),
        date,
      })
    })
    .collect();
  hearings.sort_by_key(|h| h.date);
  hearings
}

pub async fn view<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  CsrfToken(csrf_token): CsrfToken,
) -> Result<Json<DashboardView>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let store = &state.store;
  let today = today();

  // The session outlived its account.
  let user = store
    .get_user(me.user_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::AuthenticationRequired)?;

  let case_stats = store.case_stats(me.user_id, today).await.map_err(Error::store)?;
  let petition_stats = store.petition_stats(me.user_id).await.map_err(Error::store)?;
  let recent_cases = store
    .list_cases(me.user_id, Some(RECENT))
    .await
    .map_err(Error::store)?;
  let recent_petitions = store
    .list_petitions(me.user_id, Some(RECENT))
    .await
    .map_err(Error::store)?;
  let recent_documents = store
    .find_active_documents(DocumentFilter {
      user_id: Some(me.user_id),
      limit: Some(RECENT),
      ..Default::default()
    })
    .await
    .map_err(Error::store)?;

  Ok(Json(DashboardView {
    user,
    case_stats,
    petition_stats,
    upcoming_hearings: upcoming_hearings(&recent_cases, today),
    recent_cases,
    recent_petitions,
    recent_documents,
    csrf_token,
  }))
}

pub async fn add_case<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Form(form): Form<CaseForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let new_case = form.validate(me.user_id)?;
  let case = state
    .store
    .create_case(new_case)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| {
      ValidationErrors::single("caseNumber", "A case with this number already exists in this court")
    })?;
  info!(user_id = %me.user_id, case_id = %case.case_id, "case created");
  Ok(Redirect::to("/dashboard"))
}

pub async fn add_petition<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Form(form): Form<PetitionForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let new_petition = form.validate(me.user_id)?;
  if let Some(case_id) = new_petition.case_id
    && state
      .store
      .get_case(case_id, me.user_id)
      .await
      .map_err(Error::store)?
      .is_none()
  {
    warn!(user_id = %me.user_id, case_id = %case_id, "petition linked to a case the user does not own");
    return Err(Error::Forbidden("Invalid case ID or access denied".to_owned()));
  }
  let petition = state
    .store
    .create_petition(new_petition)
    .await
    .map_err(Error::store)?;
  info!(user_id = %me.user_id, petition_id = %petition.petition_id, "petition created");
  Ok(Redirect::to("/dashboard"))
}

pub async fn upload_document<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  multipart: Multipart,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  custody::ingest(&*state.store, &state.custody, me.user_id, multipart).await?;
  Ok(Redirect::to("/dashboard"))
}
