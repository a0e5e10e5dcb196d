//! Handlers for `/petitions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/petitions` | Caller's petitions, newest first. Optional `?limit=` |
//! | `GET`  | `/petitions/{id}` | 404 if missing or not the caller's |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use civicalex_core::{petition::Petition, store::LegalStore};
use uuid::Uuid;

use crate::{Caller, ListParams, error::ApiError};

/// `GET /petitions[?limit=<n>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Caller(identity): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Petition>>, ApiError>
where
  S: LegalStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let petitions = store
    .list_petitions(identity.user_id, params.limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(petitions))
}

/// `GET /petitions/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Caller(identity): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Petition>, ApiError>
where
  S: LegalStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let petition = store
    .get_petition(id, identity.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("petition {id} not found")))?;
  Ok(Json(petition))
}
