//! Registration, login and logout.

use axum::{
  Extension, Form, Json,
  extract::State,
  response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use civicalex_core::{
  ValidationErrors,
  session::Identity,
  store::LegalStore,
  user::{LoginForm, NewUser, RegistrationForm},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
  AppState,
  auth::{hash_password, verify_password},
  error::{Error, Result},
  session::{CsrfToken, RequestContext, SessionChange, rotate},
};

const DUPLICATE_EMAIL: &str = "User already exists with this email";
const BAD_CREDENTIALS: &str = "Invalid credentials";

pub async fn login_page<S>(CsrfToken(csrf_token): CsrfToken) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Json(json!({ "title": "Login - CivicaLex", "csrfToken": csrf_token }))
}

pub async fn register_page<S>(CsrfToken(csrf_token): CsrfToken) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Json(json!({ "title": "Register - CivicaLex", "csrfToken": csrf_token }))
}

pub async fn register<S>(
  State(state): State<AppState<S>>,
  ctx: RequestContext,
  Form(form): Form<RegistrationForm>,
) -> Result<Response>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let valid = form.validate()?;

  if state
    .store
    .find_user_by_email(valid.email.clone())
    .await
    .map_err(Error::store)?
    .is_some()
  {
    return Err(ValidationErrors::single("email", DUPLICATE_EMAIL).into());
  }

  let password_hash = hash_password(valid.password).await?;
  let user = state
    .store
    .create_user(NewUser {
      name: valid.name,
      email: valid.email,
      password_hash,
      phone: valid.phone,
      address: valid.address,
    })
    .await
    .map_err(Error::store)?
    // Lost a race with a concurrent registration.
    .ok_or_else(|| ValidationErrors::single("email", DUPLICATE_EMAIL))?;

  let now = Utc::now();
  state
    .store
    .record_login(user.user_id, now)
    .await
    .map_err(Error::store)?;
  let sid = rotate(&state, &ctx, Identity { user_id: user.user_id, last_login: now }).await?;

  info!(user_id = %user.user_id, "user registered");
  Ok((Extension(SessionChange::Rotated(sid)), Redirect::to("/dashboard")).into_response())
}

pub async fn login<S>(
  State(state): State<AppState<S>>,
  ctx: RequestContext,
  Form(form): Form<LoginForm>,
) -> Result<Response>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let email = form.validate()?;
  let user = state
    .store
    .find_user_by_email(email)
    .await
    .map_err(Error::store)?;

  let hash = user.as_ref().map(|u| u.password_hash.clone());
  let verified = verify_password(form.password, hash).await?;
  let user = match user {
    Some(user) if verified && user.active => user,
    Some(user) => {
      warn!(user_id = %user.user_id, active = user.active, "login rejected");
      return Err(ValidationErrors::single("credentials", BAD_CREDENTIALS).into());
    }
    None => return Err(ValidationErrors::single("credentials", BAD_CREDENTIALS).into()),
  };

  let now = Utc::now();
  state
    .store
    .record_login(user.user_id, now)
    .await
    .map_err(Error::store)?;
  let sid = rotate(&state, &ctx, Identity { user_id: user.user_id, last_login: now }).await?;

  info!(user_id = %user.user_id, "user logged in");
  Ok((Extension(SessionChange::Rotated(sid)), Redirect::to("/dashboard")).into_response())
}

pub async fn logout<S>(State(state): State<AppState<S>>, ctx: RequestContext) -> Response
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if let Some(session_id) = ctx.session_id
    && let Err(e) = state.store.delete_session(session_id).await
  {
    warn!(error = %e, "failed to delete session at logout");
  }
  if let Some(identity) = ctx.identity {
    info!(user_id = %identity.user_id, "user logged out");
  }
  (Extension(SessionChange::Ended), Redirect::to("/")).into_response()
}
