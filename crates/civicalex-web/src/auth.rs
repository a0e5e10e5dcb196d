//! Password hashing and the logged-in-user extractor.

use std::sync::LazyLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use civicalex_core::session::Identity;
use rand_core::OsRng;

use crate::error::Error;

/// Present in a handler's arguments means the request carries a logged-in
/// session. Otherwise the request is redirected to `/login` before the
/// handler runs.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
  type Rejection = Error;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Identity>()
      .copied()
      .map(CurrentUser)
      .ok_or(Error::AuthenticationRequired)
  }
}

/// Verified against when the account does not exist, so that a login for an
/// unknown email costs the same as one with a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
  LazyLock::new(|| hash_blocking("civicalex-dummy-password").ok());

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Hash with argon2id at the library's default parameters, off the async
/// runtime.
pub async fn hash_password(password: String) -> Result<String, Error> {
  tokio::task::spawn_blocking(move || hash_blocking(&password))
    .await
    .map_err(|e| Error::Internal(format!("hash task failed: {e}")))?
    .map_err(|e| Error::Internal(format!("argon2 error: {e}")))
}

/// Check `password` against `hash`. With no hash, a dummy is checked instead
/// and the result is always `false`.
pub async fn verify_password(password: String, hash: Option<String>) -> Result<bool, Error> {
  tokio::task::spawn_blocking(move || {
    let known = hash.is_some();
    let Some(phc) = hash.or_else(|| DUMMY_HASH.clone()) else {
      return false;
    };
    let Ok(parsed) = PasswordHash::new(&phc) else {
      tracing::warn!("stored password hash is not a valid PHC string");
      return false;
    };
    let ok = Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok();
    known && ok
  })
  .await
  .map_err(|e| Error::Internal(format!("verify task failed: {e}")))
}
