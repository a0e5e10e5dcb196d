use axum::{Form, Json, extract::State, response::Redirect};
use chrono::Utc;
use civicalex_core::{
  ValidationErrors,
  store::LegalStore,
  user::{PasswordChangeForm, ProfileForm, User},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  AppState,
  auth::{CurrentUser, hash_password, verify_password},
  error::{Error, Result},
  session::CsrfToken,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
  pub user:       User,
  pub csrf_token: String,
}

async fn load_user<S>(state: &AppState<S>, me: &CurrentUser) -> Result<User>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state
    .store
    .get_user(me.0.user_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::AuthenticationRequired)
}

pub async fn view<S>(
  State(state): State<AppState<S>>,
  me: CurrentUser,
  CsrfToken(csrf_token): CsrfToken,
) -> Result<Json<ProfileView>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let user = load_user(&state, &me).await?;
  Ok(Json(ProfileView { user, csrf_token }))
}

pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Form(form): Form<ProfileForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let update = form.validate()?;
  if !state
    .store
    .update_profile(me.user_id, update)
    .await
    .map_err(Error::store)?
  {
    return Err(Error::AuthenticationRequired);
  }
  info!(user_id = %me.user_id, "profile updated");
  Ok(Redirect::to("/profile"))
}

pub async fn change_password<S>(
  State(state): State<AppState<S>>,
  me: CurrentUser,
  Form(form): Form<PasswordChangeForm>,
) -> Result<Redirect>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  form.validate()?;
  let user = load_user(&state, &me).await?;

  if !verify_password(form.current_password, Some(user.password_hash)).await? {
    warn!(user_id = %user.user_id, "password change with wrong current password");
    return Err(
      ValidationErrors::single("currentPassword", "Current password is incorrect").into(),
    );
  }

  let hash = hash_password(form.new_password).await?;
  state
    .store
    .set_password_hash(user.user_id, hash, Utc::now())
    .await
    .map_err(Error::store)?;
  info!(user_id = %user.user_id, "password changed");
  Ok(Redirect::to("/profile"))
}
