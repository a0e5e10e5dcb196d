//! Error type for `civicalex-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] civicalex_core::Error),

  /// A record failed its invariants and was not written.
  #[error(transparent)]
  Invalid(#[from] civicalex_core::ValidationErrors),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("value out of range: {0}")]
  OutOfRange(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
