//! Field-level validation shared by every form in the application.
//!
//! Validators never stop at the first problem: they collect one
//! [`FieldError`] per offending field so the caller can show all of them at
//! once.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

/// A problem with a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

/// All problems found while validating one form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  /// A one-entry error, for checks that happen outside a form validator.
  pub fn single(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.push(field, message);
    errors
  }

  pub fn push(&mut self, field: &str, message: impl Into<String>) {
    self.0.push(FieldError {
      field:   field.to_owned(),
      message: message.into(),
    });
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn fields(&self) -> &[FieldError] { &self.0 }

  pub fn has(&self, field: &str) -> bool {
    self.0.iter().any(|e| e.field == field)
  }

  /// `Ok(value)` if nothing was recorded, otherwise `Err(self)`.
  pub fn finish<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
    write!(f, "validation failed: {}", messages.join("; "))
  }
}

impl std::error::Error for ValidationErrors {}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Trim an optional form value; blank becomes `None`.
pub fn trimmed(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

/// Lowercase and trim an email address.
pub fn normalize_email(raw: &str) -> String { raw.trim().to_lowercase() }

/// Strip the punctuation people type into phone numbers.
pub fn normalize_phone(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '-'))
    .collect()
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Record an error if `value` is blank; returns the trimmed value.
pub fn required(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  label: &str,
) -> String {
  let value = value.trim();
  if value.is_empty() {
    errors.push(field, format!("{label} is required"));
  }
  value.to_owned()
}

/// Record an error if `value` is longer than `max` characters.
pub fn max_len(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  max: usize,
  label: &str,
) {
  if value.chars().count() > max {
    errors.push(field, format!("{label} cannot exceed {max} characters"));
  }
}

/// Record an error if `value` is shorter than `min` characters.
pub fn min_len(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  min: usize,
  label: &str,
) {
  if value.chars().count() < min {
    errors.push(field, format!("{label} must be at least {min} characters"));
  }
}

/// A pragmatic address check: one `@`, a non-empty local part and a dotted
/// domain made of letters, digits and hyphens.
pub fn is_valid_email(s: &str) -> bool {
  if s.len() > 254 || s.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  if local.is_empty() || local.len() > 64 || domain.contains('@') {
    return false;
  }
  let labels: Vec<&str> = domain.split('.').collect();
  labels.len() >= 2
    && labels.iter().all(|l| {
      !l.is_empty()
        && !l.starts_with('-')
        && !l.ends_with('-')
        && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Indian mobile format: ten digits starting 6-9, optionally prefixed with
/// `91` or `+91`.
pub fn is_valid_phone(s: &str) -> bool {
  let rest = if let Some(r) = s.strip_prefix("+91") {
    r
  } else if s.len() == 12 {
    s.strip_prefix("91").unwrap_or(s)
  } else {
    s
  };
  rest.len() == 10
    && rest.starts_with(['6', '7', '8', '9'])
    && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an optional date field. Accepts `YYYY-MM-DD` or a full RFC 3339
/// timestamp (whose date part is kept).
pub fn optional_date(
  errors: &mut ValidationErrors,
  field: &str,
  value: Option<String>,
  label: &str,
) -> Option<NaiveDate> {
  let raw = trimmed(value)?;
  if let Ok(d) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
    return Some(d);
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
    return Some(dt.date_naive());
  }
  errors.push(field, format!("{label} is not a valid date"));
  None
}

/// Parse an optional record reference. Blank means "no link".
pub fn optional_id(
  errors: &mut ValidationErrors,
  field: &str,
  value: Option<String>,
  label: &str,
) -> Option<Uuid> {
  let raw = trimmed(value)?;
  match Uuid::parse_str(&raw) {
    Ok(id) => Some(id),
    Err(_) => {
      errors.push(field, format!("Invalid {label} ID"));
      None
    }
  }
}

/// Parse a required closed-enumeration field.
pub fn label<T: std::str::FromStr>(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  message: &str,
) -> Option<T> {
  match value.trim().parse() {
    Ok(v) => Some(v),
    Err(_) => {
      errors.push(field, message);
      None
    }
  }
}
