//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases` | Caller's cases, newest first. Optional `?limit=` |
//! | `GET`  | `/cases/{id}` | 404 if missing or not the caller's |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use civicalex_core::{case::Case, store::LegalStore};
use uuid::Uuid;

use crate::{Caller, ListParams, error::ApiError};

/// `GET /cases[?limit=<n>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Caller(identity): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Case>>, ApiError>
where
  S: LegalStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let cases = store
    .list_cases(identity.user_id, params.limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(cases))
}

/// `GET /cases/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Caller(identity): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Case>, ApiError>
where
  S: LegalStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let case = store
    .get_case(id, identity.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("case {id} not found")))?;
  Ok(Json(case))
}
