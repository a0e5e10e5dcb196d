//! Error types, the HTML error page, and axum `IntoResponse`.
//!
//! Every failure a page handler can produce ends up here. Server-side
//! failures (`Store`, `Storage`, `Internal`) are logged in full and shown to
//! the client as a generic page; the detail rides along in an
//! [`ErrorDetail`] response extension that [`expose_error_detail`] renders
//! only in development.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::StatusCode,
  middleware::Next,
  response::{Html, IntoResponse, Redirect, Response},
};
use civicalex_core::ValidationErrors;
use thiserror::Error;

use crate::{Environment, ServerConfig, custody::CustodyError};

pub const CSRF_MESSAGE: &str =
  "Invalid security token. Please refresh the page and try again.";

const GENERIC_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationErrors),
  #[error("authentication required")]
  AuthenticationRequired,
  #[error("forbidden: {0}")]
  Forbidden(String),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("invalid CSRF token")]
  CsrfInvalid,
  #[error("rate limited: {0}")]
  RateLimited(&'static str),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("storage error: {0}")]
  Storage(String),
  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Box a backend error. Handy as `.map_err(Error::store)`.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }
}

impl From<CustodyError> for Error {
  fn from(e: CustodyError) -> Self {
    match e {
      CustodyError::NotFound | CustodyError::Forbidden => {
        Error::Forbidden(crate::custody::ACCESS_DENIED.to_owned())
      }
      CustodyError::LinkDenied(msg) => Error::Forbidden(msg.to_owned()),
      CustodyError::Validation(errors) => Error::Validation(errors),
      CustodyError::FileMissing => Error::NotFound("File not found on server".to_owned()),
      CustodyError::StorageUnavailable(msg) => Error::Storage(msg),
      CustodyError::Store(e) => Error::Store(e),
    }
  }
}

/// Server-side detail of a 500, carried to [`expose_error_detail`].
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Validation(errors) => {
        let lines: Vec<String> =
          errors.fields().iter().map(|e| e.message.clone()).collect();
        render(StatusCode::BAD_REQUEST, "Invalid Input", &lines, None)
      }
      Error::AuthenticationRequired => Redirect::to("/login").into_response(),
      Error::Forbidden(msg) => render(StatusCode::FORBIDDEN, "Access Denied", &[msg], None),
      Error::NotFound(msg) => render(StatusCode::NOT_FOUND, "Not Found", &[msg], None),
      Error::CsrfInvalid => render(
        StatusCode::FORBIDDEN,
        "Security Error",
        &[CSRF_MESSAGE.to_owned()],
        None,
      ),
      Error::RateLimited(msg) => render(
        StatusCode::TOO_MANY_REQUESTS,
        "Too Many Requests",
        &[msg.to_owned()],
        None,
      ),
      e @ (Error::Store(_) | Error::Storage(_) | Error::Internal(_)) => {
        tracing::error!(error = %e, "request failed");
        let mut res = render(
          StatusCode::INTERNAL_SERVER_ERROR,
          "Server Error",
          &[GENERIC_MESSAGE.to_owned()],
          None,
        );
        res.extensions_mut().insert(ErrorDetail(e.to_string()));
        res
      }
    }
  }
}

/// Render the minimal error page. Every string is escaped.
pub fn render(
  status: StatusCode,
  title: &str,
  lines: &[String],
  detail: Option<&str>,
) -> Response {
  let items: String = lines
    .iter()
    .map(|l| format!("<li>{}</li>", escape(l)))
    .collect();
  let detail = detail
    .map(|d| format!("<pre>{}</pre>", escape(d)))
    .unwrap_or_default();
  let title = escape(title);
  let body = format!(
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title} | CivicaLex</title>\
     </head><body><h1>{title}</h1><ul>{items}</ul>{detail}</body></html>"
  );
  (status, Html(body)).into_response()
}

pub fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

/// In development, re-render 500 pages with their [`ErrorDetail`]. In
/// production the extension is dropped unread.
pub async fn expose_error_detail(
  State(config): State<Arc<ServerConfig>>,
  req: Request,
  next: Next,
) -> Response {
  let mut res = next.run(req).await;
  let Some(ErrorDetail(detail)) = res.extensions_mut().remove::<ErrorDetail>() else {
    return res;
  };
  if config.environment != Environment::Development {
    return res;
  }
  render(
    res.status(),
    "Server Error",
    &[GENERIC_MESSAGE.to_owned()],
    Some(&detail),
  )
}
