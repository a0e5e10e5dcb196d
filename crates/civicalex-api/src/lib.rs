//! JSON REST API for CivicaLex.
//!
//! Exposes an axum [`Router`] backed by any [`civicalex_core::store::LegalStore`].
//! Sessions, CSRF and rate limiting are the caller's responsibility: the
//! embedding server must insert the caller's
//! [`Identity`](civicalex_core::session::Identity) as a request extension
//! before these handlers run. Without one, every route answers a JSON 401.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", civicalex_api::api_router(store.clone()))
//! ```

pub mod cases;
pub mod error;
pub mod petitions;

use std::sync::Arc;

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::get,
};
use civicalex_core::{session::Identity, store::LegalStore};
use serde::Deserialize;

pub use error::ApiError;

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/cases", get(cases::list::<S>))
    .route("/cases/{id}", get(cases::get_one::<S>))
    .route("/petitions", get(petitions::list::<S>))
    .route("/petitions/{id}", get(petitions::get_one::<S>))
    .with_state(store)
}

/// The authenticated caller, taken from the request's [`Identity`]
/// extension.
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Identity>()
      .copied()
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::Utc;
  use civicalex_core::{
    case::{CaseType, NewCase, Parties},
    user::NewUser,
  };
  use civicalex_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn seeded() -> (Arc<SqliteStore>, Uuid, Uuid) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut users = Vec::new();
    for email in ["a@x.com", "b@x.com"] {
      let u = store
        .create_user(NewUser {
          name:          "Someone".into(),
          email:         email.into(),
          password_hash: "h".into(),
          phone:         None,
          address:       None,
        })
        .await
        .unwrap()
        .unwrap();
      users.push(u.user_id);
    }
    store
      .create_case(NewCase {
        user_id:      users[0],
        title:        "Rent dispute".into(),
        description:  None,
        case_type:    CaseType::Civil,
        court:        "District Court".into(),
        case_number:  "DC/1".into(),
        parties:      Parties::default(),
        filing_date:  None,
        next_hearing: None,
      })
      .await
      .unwrap()
      .unwrap();
    (Arc::new(store), users[0], users[1])
  }

  fn as_user(store: Arc<SqliteStore>, user_id: Uuid) -> Router {
    api_router(store).layer(Extension(Identity { user_id, last_login: Utc::now() }))
  }

  async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn missing_identity_is_json_401() {
    let (store, _, _) = seeded().await;
    let (status, body) = get_json(api_router(store), "/cases").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
  }

  #[tokio::test]
  async fn lists_only_the_callers_cases() {
    let (store, a, b) = seeded().await;

    let (status, body) = get_json(as_user(store.clone(), a), "/cases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["case_number"], "DC/1");

    let (_, body) = get_json(as_user(store.clone(), b), "/cases").await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = get_json(as_user(store, b), "/petitions").await;
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn foreign_case_is_404() {
    let (store, a, b) = seeded().await;
    let (_, list) = get_json(as_user(store.clone(), a), "/cases").await;
    let id = list[0]["case_id"].as_str().unwrap().to_owned();

    let (status, _) = get_json(as_user(store.clone(), a), &format!("/cases/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json(as_user(store, b), &format!("/cases/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
