//! Users and the forms that create or change them.
//!
//! Password hashing happens in the web layer; this module only ever sees the
//! raw password inside a form on its way to the hasher, and the PHC hash
//! string afterwards. Neither appears in `Debug` output or serialised views.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{
  ValidationErrors, is_valid_email, is_valid_phone, max_len, min_len,
  normalize_email, normalize_phone, required, trimmed,
};

pub const MIN_PASSWORD_LEN: usize = 6;

labelled_enum! {
  pub enum Role {
    User  => "user",
    Admin => "admin",
  }
}

impl Default for Role {
  fn default() -> Self { Role::User }
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Clone, Serialize)]
pub struct User {
  pub user_id:             Uuid,
  pub name:                String,
  pub email:               String,
  #[serde(skip_serializing)]
  pub password_hash:       String,
  pub phone:               Option<String>,
  pub address:             Option<String>,
  pub role:                Role,
  pub active:              bool,
  pub email_verified:      bool,
  pub last_login:          Option<DateTime<Utc>>,
  pub password_changed_at: Option<DateTime<Utc>>,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
}

impl fmt::Debug for User {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("User")
      .field("user_id", &self.user_id)
      .field("email", &self.email)
      .field("role", &self.role)
      .field("active", &self.active)
      .finish_non_exhaustive()
  }
}

/// Input to [`crate::store::LegalStore::create_user`]. The email is already
/// normalised and the password already hashed.
#[derive(Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub phone:         Option<String>,
  pub address:       Option<String>,
}

/// Input to [`crate::store::LegalStore::update_profile`].
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
  pub name:    String,
  pub phone:   Option<String>,
  pub address: Option<String>,
}

// ─── Forms ───────────────────────────────────────────────────────────────────

/// `POST /register` body.
#[derive(Default, Deserialize)]
pub struct RegistrationForm {
  #[serde(default)]
  pub name:     String,
  #[serde(default)]
  pub email:    String,
  #[serde(default)]
  pub password: String,
  pub phone:    Option<String>,
  pub address:  Option<String>,
}

/// A registration that passed validation; the password is still raw and must
/// be hashed before anything is stored.
pub struct ValidRegistration {
  pub name:     String,
  pub email:    String,
  pub password: String,
  pub phone:    Option<String>,
  pub address:  Option<String>,
}

impl RegistrationForm {
  pub fn validate(self) -> Result<ValidRegistration, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = required(&mut errors, "name", &self.name, "Name");
    if !name.is_empty() {
      min_len(&mut errors, "name", &name, 2, "Name");
      max_len(&mut errors, "name", &name, 100, "Name");
    }

    let email = normalize_email(&self.email);
    if !is_valid_email(&email) {
      errors.push("email", "Please provide a valid email");
    }

    min_len(&mut errors, "password", &self.password, MIN_PASSWORD_LEN, "Password");

    let phone = check_phone(&mut errors, self.phone);
    let address = trimmed(self.address);
    if let Some(a) = &address {
      max_len(&mut errors, "address", a, 500, "Address");
    }

    errors.finish(ValidRegistration {
      name,
      email,
      password: self.password,
      phone,
      address,
    })
  }
}

/// `POST /login` body.
#[derive(Default, Deserialize)]
pub struct LoginForm {
  #[serde(default)]
  pub email:    String,
  #[serde(default)]
  pub password: String,
}

impl LoginForm {
  /// Shape check only; returns the normalised email.
  pub fn validate(&self) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = normalize_email(&self.email);
    if !is_valid_email(&email) {
      errors.push("email", "Please provide a valid email");
    }
    min_len(&mut errors, "password", &self.password, MIN_PASSWORD_LEN, "Password");
    errors.finish(email)
  }
}

/// `POST /profile/update` body.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
  #[serde(default)]
  pub name:    String,
  pub phone:   Option<String>,
  pub address: Option<String>,
}

impl ProfileForm {
  pub fn validate(self) -> Result<ProfileUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = required(&mut errors, "name", &self.name, "Name");
    if !name.is_empty() {
      min_len(&mut errors, "name", &name, 2, "Name");
      max_len(&mut errors, "name", &name, 100, "Name");
    }
    let phone = check_phone(&mut errors, self.phone);
    let address = trimmed(self.address);
    if let Some(a) = &address {
      max_len(&mut errors, "address", a, 500, "Address");
    }
    errors.finish(ProfileUpdate { name, phone, address })
  }
}

/// `POST /profile/change-password` body.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeForm {
  #[serde(default)]
  pub current_password: String,
  #[serde(default)]
  pub new_password:     String,
  #[serde(default)]
  pub confirm_password: String,
}

impl PasswordChangeForm {
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if self.current_password.is_empty() {
      errors.push("currentPassword", "Current password is required");
    }
    min_len(
      &mut errors,
      "newPassword",
      &self.new_password,
      MIN_PASSWORD_LEN,
      "New password",
    );
    if self.confirm_password != self.new_password {
      errors.push("confirmPassword", "Passwords do not match");
    }
    errors.finish(())
  }
}

fn check_phone(errors: &mut ValidationErrors, phone: Option<String>) -> Option<String> {
  let phone = trimmed(phone).map(|p| normalize_phone(&p))?;
  if !is_valid_phone(&phone) {
    errors.push("phone", "Please provide a valid 10-digit Indian phone number");
  }
  Some(phone)
}
