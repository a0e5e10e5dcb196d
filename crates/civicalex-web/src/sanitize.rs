//! Request body sanitization for urlencoded forms and JSON objects.
//!
//! Keys starting with `$` are dropped (operator injection), values are
//! trimmed and lose any leading `$`, and each value is then cleaned
//! according to the field it belongs to.

use axum::{
  body::{Body, to_bytes},
  extract::Request,
  http::{HeaderMap, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use civicalex_core::ValidationErrors;
use serde_json::Value;

use crate::{MAX_BODY_BYTES, error::Error};

/// Clean one value for `key`. Returns `None` when the key itself must go.
pub fn clean_field(key: &str, value: &str) -> Option<String> {
  if key.starts_with('$') {
    return None;
  }
  let value = value.trim().trim_start_matches('$');
  let cleaned = match key {
    "email" => value.chars().filter(|c| !c.is_whitespace()).collect(),
    "phone" => value
      .chars()
      .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '-'))
      .collect(),
    _ => value
      .chars()
      .filter(|c| !matches!(c, '\0' | '\r' | '\n' | '$'))
      .collect(),
  };
  Some(cleaned)
}

pub fn clean_form(body: &[u8]) -> String {
  let mut out = url::form_urlencoded::Serializer::new(String::new());
  for (key, value) in url::form_urlencoded::parse(body) {
    if let Some(value) = clean_field(&key, &value) {
      out.append_pair(&key, &value);
    }
  }
  out.finish()
}

/// Top-level string fields are cleaned; `$` keys are dropped at any depth.
pub fn clean_json(value: &mut Value) {
  match value {
    Value::Object(map) => {
      map.retain(|k, _| !k.starts_with('$'));
      for (key, v) in map.iter_mut() {
        match v {
          Value::String(s) => {
            if let Some(cleaned) = clean_field(key, s) {
              *s = cleaned;
            }
          }
          other => drop_dollar_keys(other),
        }
      }
    }
    other => drop_dollar_keys(other),
  }
}

fn drop_dollar_keys(value: &mut Value) {
  match value {
    Value::Object(map) => {
      map.retain(|k, _| !k.starts_with('$'));
      map.values_mut().for_each(drop_dollar_keys);
    }
    Value::Array(items) => items.iter_mut().for_each(drop_dollar_keys),
    _ => {}
  }
}

pub(crate) fn has_content_type(headers: &HeaderMap, expected: &str) -> bool {
  headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(';').next())
    .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

pub(crate) async fn buffer(body: Body) -> Result<bytes::Bytes, Error> {
  to_bytes(body, MAX_BODY_BYTES)
    .await
    .map_err(|_| ValidationErrors::single("body", "Request body is too large").into())
}

pub async fn middleware(req: Request, next: Next) -> Response {
  let is_form = has_content_type(req.headers(), "application/x-www-form-urlencoded");
  let is_json = has_content_type(req.headers(), "application/json");
  if !is_form && !is_json {
    return next.run(req).await;
  }

  let (mut parts, body) = req.into_parts();
  let bytes = match buffer(body).await {
    Ok(b) => b,
    Err(e) => return e.into_response(),
  };

  let cleaned = if is_form {
    bytes::Bytes::from(clean_form(&bytes))
  } else {
    match serde_json::from_slice::<Value>(&bytes) {
      Ok(mut value) => {
        clean_json(&mut value);
        match serde_json::to_vec(&value) {
          Ok(v) => bytes::Bytes::from(v),
          Err(_) => bytes,
        }
      }
      // Left for the handler's extractor to reject.
      Err(_) => bytes,
    }
  };

  parts.headers.remove(header::CONTENT_LENGTH);
  next.run(Request::from_parts(parts, Body::from(cleaned))).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn drops_operator_keys() {
    assert_eq!(clean_field("$where", "1"), None);
    assert_eq!(clean_field("title", "  $$ne  ").as_deref(), Some("ne"));
  }

  #[test]
  fn field_specific_rules() {
    assert_eq!(clean_field("email", " a @x.com ").as_deref(), Some("a@x.com"));
    assert_eq!(clean_field("phone", "(987) 654-3210").as_deref(), Some("9876543210"));
    assert_eq!(
      clean_field("title", "Rent\r\ndispute\0 $5").as_deref(),
      Some("Rentdispute 5"),
    );
  }

  #[test]
  fn form_round_trip() {
    let cleaned = clean_form(b"title=+Rent+dispute+&%24gt=1&email=A%40X.com");
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(cleaned.as_bytes())
      .into_owned()
      .collect();
    assert_eq!(
      pairs,
      vec![
        ("title".to_owned(), "Rent dispute".to_owned()),
        ("email".to_owned(), "A@X.com".to_owned()),
      ],
    );
  }

  #[test]
  fn json_nested_operators_removed() {
    let mut v = json!({
      "message": " hi\n",
      "$set": {"role": "admin"},
      "filter": {"$gt": 1, "ok": [{"$ne": 2}]},
    });
    clean_json(&mut v);
    assert_eq!(v, json!({"message": "hi", "filter": {"ok": [{}]}}));
  }

  #[test]
  fn content_type_with_charset() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::CONTENT_TYPE,
      "application/json; charset=utf-8".parse().unwrap(),
    );
    assert!(has_content_type(&headers, "application/json"));
    assert!(!has_content_type(&headers, "application/x-www-form-urlencoded"));
  }
}
