//! The public contact form. Submissions are validated and logged.

use axum::{Form, Json};
use civicalex_core::{
  ValidationErrors,
  store::LegalStore,
  validate::{
    is_valid_email, is_valid_phone, max_len, min_len, normalize_email, normalize_phone,
    required, trimmed,
  },
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{error::Result, session::CsrfToken};

pub const THANK_YOU: &str = "Thank you for contacting us! We will respond within 24-48 hours.";

#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
  #[serde(default)]
  pub name:    String,
  #[serde(default)]
  pub email:   String,
  pub phone:   Option<String>,
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub message: String,
  pub urgent:  Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ContactRequest {
  pub name:    String,
  pub email:   String,
  pub phone:   Option<String>,
  pub subject: String,
  pub message: String,
  pub urgent:  bool,
}

impl ContactForm {
  pub fn validate(self) -> Result<ContactRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = self.name.trim().to_owned();
    min_len(&mut errors, "name", &name, 2, "Name");
    max_len(&mut errors, "name", &name, 100, "Name");

    let email = normalize_email(&self.email);
    if !is_valid_email(&email) {
      errors.push("email", "Please provide a valid email");
    }

    let phone = trimmed(self.phone).map(|p| normalize_phone(&p));
    if let Some(p) = &phone
      && !is_valid_phone(p)
    {
      errors.push("phone", "Please provide a valid 10-digit Indian phone number");
    }

    let subject = required(&mut errors, "subject", &self.subject, "Subject");
    max_len(&mut errors, "subject", &subject, 200, "Subject");

    let message = self.message.trim().to_owned();
    min_len(&mut errors, "message", &message, 10, "Message");
    max_len(&mut errors, "message", &message, 5000, "Message");

    errors.finish(ContactRequest {
      name,
      email,
      phone,
      subject,
      message,
      urgent: self.urgent.as_deref() == Some("on"),
    })
  }
}

pub async fn page<S>(CsrfToken(csrf_token): CsrfToken) -> Json<Value>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Json(json!({ "title": "Contact Us - CivicaLex", "csrfToken": csrf_token }))
}

pub async fn submit(Form(form): Form<ContactForm>) -> Result<Json<Value>> {
  let request = form.validate()?;
  info!(
    email = %request.email,
    subject = %request.subject,
    urgent = request.urgent,
    "contact form received"
  );
  Ok(Json(json!({ "success": true, "message": THANK_YOU })))
}
