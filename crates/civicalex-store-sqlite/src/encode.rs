//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! so that string order is time order. Calendar dates are `YYYY-MM-DD`.
//! Labelled enums are stored as their display label. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use civicalex_core::{
  case::{Case, Notification, Parties, TimelineEntry},
  document::Document,
  petition::Petition,
  session::Session,
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

pub fn decode_label<T>(s: &str) -> Result<T>
where
  T: FromStr<Err = civicalex_core::Error>,
{
  Ok(s.parse()?)
}

pub fn encode_size(n: u64) -> Result<i64> {
  i64::try_from(n).map_err(|_| Error::OutOfRange(format!("size {n}")))
}

pub fn decode_size(n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::OutOfRange(format!("size {n}")))
}

/// A `LIKE` pattern matching `text` anywhere, with wildcards in `text`
/// escaped by `\`.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, name, email, password_hash, phone, address, role,
   active, email_verified, last_login, password_changed_at, created_at, updated_at";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:             String,
  pub name:                String,
  pub email:               String,
  pub password_hash:       String,
  pub phone:               Option<String>,
  pub address:             Option<String>,
  pub role:                String,
  pub active:              bool,
  pub email_verified:      bool,
  pub last_login:          Option<String>,
  pub password_changed_at: Option<String>,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:             row.get(0)?,
      name:                row.get(1)?,
      email:               row.get(2)?,
      password_hash:       row.get(3)?,
      phone:               row.get(4)?,
      address:             row.get(5)?,
      role:                row.get(6)?,
      active:              row.get(7)?,
      email_verified:      row.get(8)?,
      last_login:          row.get(9)?,
      password_changed_at: row.get(10)?,
      created_at:          row.get(11)?,
      updated_at:          row.get(12)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:             decode_uuid(&self.user_id)?,
      name:                self.name,
      email:               self.email,
      password_hash:       self.password_hash,
      phone:               self.phone,
      address:             self.address,
      role:                decode_label(&self.role)?,
      active:              self.active,
      email_verified:      self.email_verified,
      last_login:          decode_opt_dt(self.last_login)?,
      password_changed_at: decode_opt_dt(self.password_changed_at)?,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

pub const SESSION_COLUMNS: &str =
  "session_id, csrf_token, user_id, last_login, created_at, expires_at";

pub struct RawSession {
  pub session_id: String,
  pub csrf_token: String,
  pub user_id:    Option<String>,
  pub last_login: Option<String>,
  pub created_at: String,
  pub expires_at: String,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id: row.get(0)?,
      csrf_token: row.get(1)?,
      user_id:    row.get(2)?,
      last_login: row.get(3)?,
      created_at: row.get(4)?,
      expires_at: row.get(5)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id: self.session_id,
      csrf_token: self.csrf_token,
      user_id:    decode_opt_uuid(self.user_id)?,
      last_login: decode_opt_dt(self.last_login)?,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}

pub const CASE_COLUMNS: &str = "case_id, user_id, title, description, case_type, court,
   case_number, plaintiff, defendant, filing_date, next_hearing, status,
   created_at, updated_at";

/// A `cases` row plus its timeline and notifications, read in one call.
pub struct RawCase {
  pub case_id:       String,
  pub user_id:       String,
  pub title:         String,
  pub description:   Option<String>,
  pub case_type:     String,
  pub court:         String,
  pub case_number:   String,
  pub plaintiff:     Option<String>,
  pub defendant:     Option<String>,
  pub filing_date:   Option<String>,
  pub next_hearing:  Option<String>,
  pub status:        String,
  pub created_at:    String,
  pub updated_at:    String,
  pub events:        Vec<RawEvent>,
  pub notifications: Vec<RawNotification>,
}

pub struct RawEvent {
  pub date:        String,
  pub action:      String,
  pub description: Option<String>,
}

pub struct RawNotification {
  pub date:    String,
  pub message: String,
  pub is_read: bool,
}

impl RawCase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:       row.get(0)?,
      user_id:       row.get(1)?,
      title:         row.get(2)?,
      description:   row.get(3)?,
      case_type:     row.get(4)?,
      court:         row.get(5)?,
      case_number:   row.get(6)?,
      plaintiff:     row.get(7)?,
      defendant:     row.get(8)?,
      filing_date:   row.get(9)?,
      next_hearing:  row.get(10)?,
      status:        row.get(11)?,
      created_at:    row.get(12)?,
      updated_at:    row.get(13)?,
      events:        Vec::new(),
      notifications: Vec::new(),
    })
  }

  /// Fill in the child rows. Must run on the same connection call as the
  /// parent read.
  pub fn load_children(&mut self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
      "SELECT date, action, description FROM case_events
       WHERE case_id = ?1 ORDER BY event_id",
    )?;
    self.events = stmt
      .query_map([&self.case_id], |row| {
        Ok(RawEvent {
          date:        row.get(0)?,
          action:      row.get(1)?,
          description: row.get(2)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached(
      "SELECT date, message, is_read FROM case_notifications
       WHERE case_id = ?1 ORDER BY notification_id",
    )?;
    self.notifications = stmt
      .query_map([&self.case_id], |row| {
        Ok(RawNotification {
          date:    row.get(0)?,
          message: row.get(1)?,
          is_read: row.get(2)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(())
  }

  pub fn into_case(self) -> Result<Case> {
    let timeline = self
      .events
      .into_iter()
      .map(|e| {
        Ok(TimelineEntry {
          date:        decode_date(&e.date)?,
          action:      e.action,
          description: e.description,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let notifications = self
      .notifications
      .into_iter()
      .map(|n| {
        Ok(Notification {
          date:    decode_dt(&n.date)?,
          message: n.message,
          is_read: n.is_read,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Case {
      case_id: decode_uuid(&self.case_id)?,
      user_id: decode_uuid(&self.user_id)?,
      title: self.title,
      description: self.description,
      case_type: decode_label(&self.case_type)?,
      court: self.court,
      case_number: self.case_number,
      parties: Parties {
        plaintiff: self.plaintiff,
        defendant: self.defendant,
      },
      filing_date: decode_opt_date(self.filing_date)?,
      next_hearing: decode_opt_date(self.next_hearing)?,
      status: decode_label(&self.status)?,
      timeline,
      notifications,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const PETITION_COLUMNS: &str = "petition_id, user_id, case_id, title, description,
   petition_type, status, court, case_number, filing_date, next_hearing,
   created_at, updated_at";

pub struct RawPetition {
  pub petition_id:   String,
  pub user_id:       String,
  pub case_id:       Option<String>,
  pub title:         String,
  pub description:   String,
  pub petition_type: String,
  pub status:        String,
  pub court:         Option<String>,
  pub case_number:   Option<String>,
  pub filing_date:   Option<String>,
  pub next_hearing:  Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawPetition {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      petition_id:   row.get(0)?,
      user_id:       row.get(1)?,
      case_id:       row.get(2)?,
      title:         row.get(3)?,
      description:   row.get(4)?,
      petition_type: row.get(5)?,
      status:        row.get(6)?,
      court:         row.get(7)?,
      case_number:   row.get(8)?,
      filing_date:   row.get(9)?,
      next_hearing:  row.get(10)?,
      created_at:    row.get(11)?,
      updated_at:    row.get(12)?,
    })
  }

  pub fn into_petition(self) -> Result<Petition> {
    Ok(Petition {
      petition_id:   decode_uuid(&self.petition_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      case_id:       decode_opt_uuid(self.case_id)?,
      title:         self.title,
      description:   self.description,
      petition_type: decode_label(&self.petition_type)?,
      status:        decode_label(&self.status)?,
      court:         self.court,
      case_number:   self.case_number,
      filing_date:   decode_opt_date(self.filing_date)?,
      next_hearing:  decode_opt_date(self.next_hearing)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const DOCUMENT_COLUMNS: &str = "document_id, user_id, case_id, petition_id, file_name,
   file_path, mime_type, file_size, category, description, version, access_level,
   shared_with, sha256, is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct RawDocument {
  pub document_id:  String,
  pub user_id:      String,
  pub case_id:      Option<String>,
  pub petition_id:  Option<String>,
  pub file_name:    String,
  pub file_path:    String,
  pub mime_type:    String,
  pub file_size:    i64,
  pub category:     Option<String>,
  pub description:  Option<String>,
  pub version:      u32,
  pub access_level: String,
  pub shared_with:  String,
  pub sha256:       String,
  pub is_deleted:   bool,
  pub deleted_at:   Option<String>,
  pub deleted_by:   Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:  row.get(0)?,
      user_id:      row.get(1)?,
      case_id:      row.get(2)?,
      petition_id:  row.get(3)?,
      file_name:    row.get(4)?,
      file_path:    row.get(5)?,
      mime_type:    row.get(6)?,
      file_size:    row.get(7)?,
      category:     row.get(8)?,
      description:  row.get(9)?,
      version:      row.get(10)?,
      access_level: row.get(11)?,
      shared_with:  row.get(12)?,
      sha256:       row.get(13)?,
      is_deleted:   row.get(14)?,
      deleted_at:   row.get(15)?,
      deleted_by:   row.get(16)?,
      created_at:   row.get(17)?,
      updated_at:   row.get(18)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    let shared_with: Vec<Uuid> = serde_json::from_str(&self.shared_with)?;
    Ok(Document {
      document_id:  decode_uuid(&self.document_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      case_id:      decode_opt_uuid(self.case_id)?,
      petition_id:  decode_opt_uuid(self.petition_id)?,
      file_name:    self.file_name,
      file_path:    self.file_path,
      mime_type:    self.mime_type,
      file_size:    decode_size(self.file_size)?,
      category:     self.category.as_deref().map(decode_label).transpose()?,
      description:  self.description,
      version:      self.version,
      access_level: decode_label(&self.access_level)?,
      shared_with,
      sha256:       self.sha256,
      is_deleted:   self.is_deleted,
      deleted_at:   decode_opt_dt(self.deleted_at)?,
      deleted_by:   decode_opt_uuid(self.deleted_by)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}
