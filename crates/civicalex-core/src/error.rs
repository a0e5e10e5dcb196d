//! Error types for `civicalex-core`.

use thiserror::Error;

use crate::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationErrors),

  #[error("unknown {kind} label: {value:?}")]
  UnknownLabel { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
