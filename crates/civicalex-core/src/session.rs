//! Server-side sessions and the per-request identity they carry.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// A session row. Anonymous sessions exist so that forms can carry a CSRF
/// token before login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
  /// Opaque random token; the cookie value.
  pub session_id: String,
  pub csrf_token: String,
  pub user_id:    Option<Uuid>,
  pub last_login: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Session")
      .field("user_id", &self.user_id)
      .field("expires_at", &self.expires_at)
      .finish_non_exhaustive()
  }
}

impl Session {
  pub fn anonymous(
    session_id: String,
    csrf_token: String,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> Self {
    Self {
      session_id,
      csrf_token,
      user_id: None,
      last_login: None,
      created_at: now,
      expires_at: now + ttl,
    }
  }

  pub fn authenticated(
    session_id: String,
    csrf_token: String,
    identity: Identity,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> Self {
    Self {
      user_id: Some(identity.user_id),
      last_login: Some(identity.last_login),
      ..Self::anonymous(session_id, csrf_token, now, ttl)
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

  pub fn identity(&self) -> Option<Identity> {
    let user_id = self.user_id?;
    Some(Identity {
      user_id,
      last_login: self.last_login.unwrap_or(self.created_at),
    })
  }
}

/// Who is making the current request. Copied out of the session once per
/// request and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
  pub user_id:    Uuid,
  pub last_login: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn anonymous_session_has_no_identity() {
    let now = Utc::now();
    let s = Session::anonymous("sid".into(), "tok".into(), now, Duration::hours(24));
    assert!(s.identity().is_none());
    assert!(!s.is_expired(now));
    assert!(s.is_expired(now + Duration::hours(24)));
  }

  #[test]
  fn debug_hides_tokens() {
    let now = Utc::now();
    let identity = Identity { user_id: Uuid::new_v4(), last_login: now };
    let s = Session::authenticated(
      "secret-sid".into(),
      "secret-csrf".into(),
      identity,
      now,
      Duration::hours(1),
    );
    let out = format!("{s:?}");
    assert!(!out.contains("secret-sid"));
    assert!(!out.contains("secret-csrf"));
    assert_eq!(s.identity(), Some(identity));
  }
}
