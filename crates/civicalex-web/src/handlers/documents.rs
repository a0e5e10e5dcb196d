//! Serving and deleting documents held in custody.
//!
//! A document the caller does not own and one that does not exist produce
//! the same 403 page.

use axum::{
  extract::{Path, State},
  http::{HeaderValue, header},
  response::{IntoResponse, Redirect, Response},
};
use civicalex_core::{document::is_inline_viewable, store::LegalStore};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentUser,
  custody::{self, ACCESS_DENIED},
  error::{Error, Result},
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Disposition {
  Attachment,
  Inline,
}

fn parse_document_id(raw: &str) -> Result<Uuid> {
  Uuid::parse_str(raw).map_err(|_| Error::Forbidden(ACCESS_DENIED.to_owned()))
}

/// Quote a file name for `Content-Disposition`. Anything outside printable
/// ASCII, and the quoting characters themselves, become `_`.
pub fn disposition_name(name: &str) -> String {
  name
    .chars()
    .map(|c| {
      if (c.is_ascii_graphic() || c == ' ') && !matches!(c, '"' | '\\') {
        c
      } else {
        '_'
      }
    })
    .collect()
}

async fn serve<S>(
  state: &AppState<S>,
  user_id: Uuid,
  raw_id: &str,
  disposition: Disposition,
) -> Result<Response>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let document_id = parse_document_id(raw_id)?;
  let doc = custody::authorize(&*state.store, user_id, document_id).await?;
  let bytes = state.custody.read(&doc.file_path).await?;

  let kind = match disposition {
    Disposition::Inline if is_inline_viewable(&doc.mime_type) => "inline",
    _ => "attachment",
  };
  let content_disposition = HeaderValue::from_str(&format!(
    "{kind}; filename=\"{}\"",
    disposition_name(&doc.file_name)
  ))
  .map_err(|e| Error::Internal(format!("bad disposition header: {e}")))?;
  let content_type = HeaderValue::from_str(&doc.mime_type)
    .map_err(|e| Error::Internal(format!("bad content type: {e}")))?;

  Ok(
    (
      [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, content_disposition),
        (header::CACHE_CONTROL, HeaderValue::from_static("private, no-store")),
      ],
      bytes,
    )
      .into_response(),
  )
}

pub async fn download<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
) -> Result<Response>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  serve(&state, me.user_id, &id, Disposition::Attachment).await
}

pub async fn view<S>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<String>,
) -> Result<Response>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  serve(&state, me.user_id, &id, Disposition::Inline).await
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
  let document_id = parse_document_id(&id)?;
  custody::soft_delete(&*state.store, &state.custody, me.user_id, document_id).await?;
  Ok(Redirect::to("/dashboard"))
}
