//! Synchronizer-token CSRF check for state-changing page requests.
//!
//! The expected token lives in the session (see
//! [`RequestContext`](crate::session::RequestContext)). The `/api/` tree is
//! exempt; it answers JSON and is never driven by forms.

use axum::{
  body::Body,
  extract::Request,
  http::{HeaderMap, Method},
  middleware::Next,
  response::Response,
};
use subtle::ConstantTimeEq;

use crate::{
  error::Error,
  sanitize::{buffer, has_content_type},
  session::RequestContext,
};

const HEADER_NAMES: [&str; 3] = ["x-csrf-token", "csrf-token", "x-xsrf-token"];
const FIELD: &str = "_csrf";

pub fn requires_token(method: &Method, path: &str) -> bool {
  let mutating = matches!(
    *method,
    Method::POST | Method::PUT | Method::PATCH | Method::DELETE
  );
  mutating && !path.starts_with("/api/")
}

pub fn tokens_match(presented: &str, expected: &str) -> bool {
  let (a, b) = (presented.as_bytes(), expected.as_bytes());
  a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

fn header_token(headers: &HeaderMap) -> Option<String> {
  HEADER_NAMES.iter().find_map(|name| {
    headers
      .get(*name)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned)
  })
}

fn field_token(encoded: &[u8]) -> Option<String> {
  url::form_urlencoded::parse(encoded)
    .find(|(k, _)| k == FIELD)
    .map(|(_, v)| v.into_owned())
}

pub async fn middleware(req: Request, next: Next) -> Result<Response, Error> {
  if !requires_token(req.method(), req.uri().path()) {
    return Ok(next.run(req).await);
  }

  let Some(expected) = req
    .extensions()
    .get::<RequestContext>()
    .and_then(|ctx| ctx.csrf_token.clone())
  else {
    return Err(Error::CsrfInvalid);
  };

  let (parts, body) = req.into_parts();
  let mut presented = header_token(&parts.headers)
    .or_else(|| parts.uri.query().and_then(|q| field_token(q.as_bytes())));

  let body = if presented.is_none()
    && has_content_type(&parts.headers, "application/x-www-form-urlencoded")
  {
    let bytes = buffer(body).await?;
    presented = field_token(&bytes);
    Body::from(bytes)
  } else {
    body
  };

  match presented {
    Some(token) if tokens_match(&token, &expected) => {
      Ok(next.run(Request::from_parts(parts, body)).await)
    }
    _ => {
      tracing::warn!(path = %parts.uri.path(), method = %parts.method, "CSRF token rejected");
      Err(Error::CsrfInvalid)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_mutating_page_requests_need_a_token() {
    assert!(requires_token(&Method::POST, "/dashboard/add-case"));
    assert!(requires_token(&Method::DELETE, "/cases/1"));
    assert!(!requires_token(&Method::GET, "/dashboard"));
    assert!(!requires_token(&Method::POST, "/api/ai/chat"));
  }

  #[test]
  fn comparison_is_exact() {
    assert!(tokens_match("abc", "abc"));
    assert!(!tokens_match("abd", "abc"));
    assert!(!tokens_match("ab", "abc"));
    assert!(!tokens_match("", "abc"));
  }

  #[test]
  fn header_order() {
    let mut headers = HeaderMap::new();
    headers.insert("x-xsrf-token", "third".parse().unwrap());
    headers.insert("csrf-token", "second".parse().unwrap());
    assert_eq!(header_token(&headers).as_deref(), Some("second"));
  }

  #[test]
  fn field_from_form_body() {
    assert_eq!(field_token(b"title=x&_csrf=tok").as_deref(), Some("tok"));
    assert_eq!(field_token(b"title=x"), None);
  }
}
