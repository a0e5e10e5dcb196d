//! [`SqliteStore`], the SQLite implementation of [`LegalStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use civicalex_core::{
  case::{Case, CaseStats, CaseStatus, NewCase, TimelineEntry},
  document::{AccessLevel, Document, DocumentFilter, NewDocument},
  petition::{NewPetition, Petition, PetitionStats, PetitionStatus},
  session::Session,
  store::LegalStore,
  user::{NewUser, ProfileUpdate, Role, User},
};

use crate::{
  Result,
  encode::{
    CASE_COLUMNS, DOCUMENT_COLUMNS, PETITION_COLUMNS, RawCase, RawDocument,
    RawPetition, RawSession, RawUser, SESSION_COLUMNS, USER_COLUMNS, encode_date,
    encode_dt, encode_size, encode_uuid, like_pattern,
  },
  error::Error,
  schema::SCHEMA,
};

/// UNIQUE or PRIMARY KEY only. Foreign key, CHECK and NOT NULL failures are
/// real errors and must propagate.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

fn limit_param(limit: Option<usize>) -> i64 {
  limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A CivicaLex record store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single owner-scoped `UPDATE`/`DELETE` and report whether a row
  /// matched.
  async fn execute_scoped(
    &self,
    sql: &'static str,
    params: Vec<Value>,
  ) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(sql, rusqlite::params_from_iter(params))?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn query_cases(
    &self,
    sql: String,
    params: Vec<Value>,
  ) -> Result<Vec<Case>> {
    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawCase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        for raw in &mut rows {
          raw.load_children(conn)?;
        }
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCase::into_case).collect()
  }

  async fn query_petitions(
    &self,
    sql: String,
    params: Vec<Value>,
  ) -> Result<Vec<Petition>> {
    let raws: Vec<RawPetition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawPetition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPetition::into_petition).collect()
  }

  async fn query_documents(
    &self,
    sql: String,
    params: Vec<Value>,
  ) -> Result<Vec<Document>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn query_user(&self, column: &'static str, value: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }
}

// ─── LegalStore impl ─────────────────────────────────────────────────────────

impl LegalStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<Option<User>> {
    let now = Utc::now();
    let user = User {
      user_id:             Uuid::new_v4(),
      name:                input.name,
      email:               input.email,
      password_hash:       input.password_hash,
      phone:               input.phone,
      address:             input.address,
      role:                Role::default(),
      active:              true,
      email_verified:      false,
      last_login:          None,
      password_changed_at: None,
      created_at:          now,
      updated_at:          now,
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.name.clone();
    let email    = user.email.clone();
    let hash     = user.password_hash.clone();
    let phone    = user.phone.clone();
    let address  = user.address.clone();
    let role_str = user.role.as_str();
    let at_str   = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO users (
             user_id, name, email, password_hash, phone, address, role,
             active, email_verified, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, ?8, ?8)",
          rusqlite::params![id_str, name, email, hash, phone, address, role_str, at_str],
        );
        match result {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(inserted.then_some(user))
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    self.query_user("user_id", encode_uuid(user_id)).await
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    self.query_user("email", email).await
  }

  async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE users SET last_login = ?2, updated_at = ?2 WHERE user_id = ?1",
        vec![Value::from(encode_uuid(user_id)), Value::from(encode_dt(at))],
      )
      .await
  }

  async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE users SET name = ?2, phone = ?3, address = ?4, updated_at = ?5
         WHERE user_id = ?1",
        vec![
          Value::from(encode_uuid(user_id)),
          Value::from(update.name),
          Value::from(update.phone),
          Value::from(update.address),
          Value::from(encode_dt(Utc::now())),
        ],
      )
      .await
  }

  async fn set_password_hash(
    &self,
    user_id: Uuid,
    password_hash: String,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE users SET password_hash = ?2, password_changed_at = ?3, updated_at = ?3
         WHERE user_id = ?1",
        vec![
          Value::from(encode_uuid(user_id)),
          Value::from(password_hash),
          Value::from(encode_dt(at)),
        ],
      )
      .await
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn create_session(&self, session: Session) -> Result<()> {
    let user_str  = session.user_id.map(encode_uuid);
    let login_str = session.last_login.map(encode_dt);
    let created   = encode_dt(session.created_at);
    let expires   = encode_dt(session.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_id, csrf_token, user_id, last_login, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            session.session_id,
            session.csrf_token,
            user_str,
            login_str,
            created,
            expires,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, session_id: String, now: DateTime<Utc>) -> Result<Option<Session>> {
    let now_str = encode_dt(now);
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1 AND expires_at > ?2"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![session_id, now_str], RawSession::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn touch_session(&self, session_id: String, expires_at: DateTime<Utc>) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE sessions SET expires_at = ?2 WHERE session_id = ?1",
        vec![Value::from(session_id), Value::from(encode_dt(expires_at))],
      )
      .await
  }

  async fn delete_session(&self, session_id: String) -> Result<bool> {
    self
      .execute_scoped(
        "DELETE FROM sessions WHERE session_id = ?1",
        vec![Value::from(session_id)],
      )
      .await
  }

  async fn purge_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?)
      })
      .await?;
    Ok(n as u64)
  }

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn create_case(&self, input: NewCase) -> Result<Option<Case>> {
    let now = Utc::now();
    let case = Case {
      case_id:       Uuid::new_v4(),
      user_id:       input.user_id,
      title:         input.title,
      description:   input.description,
      case_type:     input.case_type,
      court:         input.court,
      case_number:   input.case_number,
      parties:       input.parties,
      filing_date:   input.filing_date,
      next_hearing:  input.next_hearing,
      status:        CaseStatus::default(),
      timeline:      Vec::new(),
      notifications: Vec::new(),
      created_at:    now,
      updated_at:    now,
    };

    let id_str      = encode_uuid(case.case_id);
    let user_str    = encode_uuid(case.user_id);
    let title       = case.title.clone();
    let description = case.description.clone();
    let type_str    = case.case_type.as_str();
    let court       = case.court.clone();
    let number      = case.case_number.clone();
    let plaintiff   = case.parties.plaintiff.clone();
    let defendant   = case.parties.defendant.clone();
    let filing      = case.filing_date.map(encode_date);
    let hearing     = case.next_hearing.map(encode_date);
    let status_str  = case.status.as_str();
    let at_str      = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO cases (
             case_id, user_id, title, description, case_type, court, case_number,
             plaintiff, defendant, filing_date, next_hearing, status,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
          rusqlite::params![
            id_str, user_str, title, description, type_str, court, number,
            plaintiff, defendant, filing, hearing, status_str, at_str,
          ],
        );
        match result {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(inserted.then_some(case))
  }

  async fn get_case(&self, case_id: Uuid, owner: Uuid) -> Result<Option<Case>> {
    let mut found = self
      .query_cases(
        format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1 AND user_id = ?2"),
        vec![Value::from(encode_uuid(case_id)), Value::from(encode_uuid(owner))],
      )
      .await?;
    Ok(found.pop())
  }

  async fn list_cases(&self, owner: Uuid, limit: Option<usize>) -> Result<Vec<Case>> {
    self
      .query_cases(
        format!(
          "SELECT {CASE_COLUMNS} FROM cases WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ),
        vec![Value::from(encode_uuid(owner)), Value::from(limit_param(limit))],
      )
      .await
  }

  async fn case_stats(&self, owner: Uuid, today: NaiveDate) -> Result<CaseStats> {
    let owner_str = encode_uuid(owner);
    let today_str = encode_date(today);
    let (total, pending, closed, upcoming): (i64, i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(status = 'Pending'), 0),
             COALESCE(SUM(status = 'Closed'), 0),
             COALESCE(SUM(next_hearing >= ?2), 0)
           FROM cases WHERE user_id = ?1",
          rusqlite::params![owner_str, today_str],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?)
      })
      .await?;

    Ok(CaseStats {
      total:    total as u64,
      pending:  pending as u64,
      closed:   closed as u64,
      upcoming: upcoming as u64,
    })
  }

  async fn set_case_status(
    &self,
    case_id: Uuid,
    owner: Uuid,
    status: CaseStatus,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str     = encode_uuid(case_id);
    let owner_str  = encode_uuid(owner);
    let status_str = status.as_str();
    let at_str     = encode_dt(at);
    let message    = format!("Status changed to {status}");

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(
          "UPDATE cases SET status = ?3, updated_at = ?4
           WHERE case_id = ?1 AND user_id = ?2",
          rusqlite::params![id_str, owner_str, status_str, at_str],
        )?;
        if n > 0 {
          tx.execute(
            "INSERT INTO case_notifications (case_id, date, message, is_read)
             VALUES (?1, ?2, ?3, 0)",
            rusqlite::params![id_str, at_str, message],
          )?;
        }
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;
    Ok(changed)
  }

  async fn append_timeline(
    &self,
    case_id: Uuid,
    owner: Uuid,
    entry: TimelineEntry,
  ) -> Result<bool> {
    let id_str    = encode_uuid(case_id);
    let owner_str = encode_uuid(owner);
    let date_str  = encode_date(entry.date);
    let at_str    = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(
          "INSERT INTO case_events (case_id, date, action, description)
           SELECT case_id, ?3, ?4, ?5 FROM cases WHERE case_id = ?1 AND user_id = ?2",
          rusqlite::params![id_str, owner_str, date_str, entry.action, entry.description],
        )?;
        if n > 0 {
          tx.execute(
            "UPDATE cases SET updated_at = ?2 WHERE case_id = ?1",
            rusqlite::params![id_str, at_str],
          )?;
        }
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;
    Ok(changed)
  }

  async fn mark_case_notifications_read(&self, case_id: Uuid, owner: Uuid) -> Result<bool> {
    let id_str    = encode_uuid(case_id);
    let owner_str = encode_uuid(owner);

    let owned = self
      .conn
      .call(move |conn| {
        let owned = conn
          .query_row(
            "SELECT 1 FROM cases WHERE case_id = ?1 AND user_id = ?2",
            rusqlite::params![id_str, owner_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if owned {
          conn.execute(
            "UPDATE case_notifications SET is_read = 1 WHERE case_id = ?1",
            rusqlite::params![id_str],
          )?;
        }
        Ok(owned)
      })
      .await?;
    Ok(owned)
  }

  async fn delete_case(&self, case_id: Uuid, owner: Uuid) -> Result<bool> {
    self
      .execute_scoped(
        "DELETE FROM cases WHERE case_id = ?1 AND user_id = ?2",
        vec![Value::from(encode_uuid(case_id)), Value::from(encode_uuid(owner))],
      )
      .await
  }

  async fn search_cases(&self, owner: Uuid, text: String, limit: usize) -> Result<Vec<Case>> {
    self
      .query_cases(
        format!(
          "SELECT {CASE_COLUMNS} FROM cases WHERE user_id = ?1 AND (
             lower(title) LIKE ?2 ESCAPE '\\'
             OR lower(COALESCE(description, '')) LIKE ?2 ESCAPE '\\'
             OR lower(case_number) LIKE ?2 ESCAPE '\\'
           )
           ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        ),
        vec![
          Value::from(encode_uuid(owner)),
          Value::from(like_pattern(&text)),
          Value::from(limit_param(Some(limit))),
        ],
      )
      .await
  }

  // ── Petitions ─────────────────────────────────────────────────────────────

  async fn create_petition(&self, input: NewPetition) -> Result<Petition> {
    let now = Utc::now();
    let petition = Petition {
      petition_id:   Uuid::new_v4(),
      user_id:       input.user_id,
      case_id:       input.case_id,
      title:         input.title,
      description:   input.description,
      petition_type: input.petition_type,
      status:        PetitionStatus::default(),
      court:         input.court,
      case_number:   input.case_number,
      filing_date:   input.filing_date,
      next_hearing:  input.next_hearing,
      created_at:    now,
      updated_at:    now,
    };

    let id_str      = encode_uuid(petition.petition_id);
    let user_str    = encode_uuid(petition.user_id);
    let case_str    = petition.case_id.map(encode_uuid);
    let title       = petition.title.clone();
    let description = petition.description.clone();
    let type_str    = petition.petition_type.as_str();
    let status_str  = petition.status.as_str();
    let court       = petition.court.clone();
    let number      = petition.case_number.clone();
    let filing      = petition.filing_date.map(encode_date);
    let hearing     = petition.next_hearing.map(encode_date);
    let at_str      = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO petitions (
             petition_id, user_id, case_id, title, description, petition_type,
             status, court, case_number, filing_date, next_hearing,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
          rusqlite::params![
            id_str, user_str, case_str, title, description, type_str, status_str,
            court, number, filing, hearing, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(petition)
  }

  async fn get_petition(&self, petition_id: Uuid, owner: Uuid) -> Result<Option<Petition>> {
    let mut found = self
      .query_petitions(
        format!(
          "SELECT {PETITION_COLUMNS} FROM petitions WHERE petition_id = ?1 AND user_id = ?2"
        ),
        vec![Value::from(encode_uuid(petition_id)), Value::from(encode_uuid(owner))],
      )
      .await?;
    Ok(found.pop())
  }

  async fn list_petitions(&self, owner: Uuid, limit: Option<usize>) -> Result<Vec<Petition>> {
    self
      .query_petitions(
        format!(
          "SELECT {PETITION_COLUMNS} FROM petitions WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ),
        vec![Value::from(encode_uuid(owner)), Value::from(limit_param(limit))],
      )
      .await
  }

  async fn petition_stats(&self, owner: Uuid) -> Result<PetitionStats> {
    let owner_str = encode_uuid(owner);
    let (total, drafted, submitted, approved): (i64, i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(status = 'Draft'), 0),
             COALESCE(SUM(status = 'Submitted'), 0),
             COALESCE(SUM(status = 'Approved'), 0)
           FROM petitions WHERE user_id = ?1",
          rusqlite::params![owner_str],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?)
      })
      .await?;

    Ok(PetitionStats {
      total:     total as u64,
      drafted:   drafted as u64,
      submitted: submitted as u64,
      approved:  approved as u64,
    })
  }

  async fn set_petition_status(
    &self,
    petition_id: Uuid,
    owner: Uuid,
    status: PetitionStatus,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE petitions SET status = ?3, updated_at = ?4
         WHERE petition_id = ?1 AND user_id = ?2",
        vec![
          Value::from(encode_uuid(petition_id)),
          Value::from(encode_uuid(owner)),
          Value::from(status.as_str().to_owned()),
          Value::from(encode_dt(at)),
        ],
      )
      .await
  }

  async fn submit_petition(&self, petition_id: Uuid, owner: Uuid, today: NaiveDate) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE petitions SET status = 'Submitted', filing_date = ?3, updated_at = ?4
         WHERE petition_id = ?1 AND user_id = ?2 AND status = 'Draft'",
        vec![
          Value::from(encode_uuid(petition_id)),
          Value::from(encode_uuid(owner)),
          Value::from(encode_date(today)),
          Value::from(encode_dt(Utc::now())),
        ],
      )
      .await
  }

  async fn delete_petition(&self, petition_id: Uuid, owner: Uuid) -> Result<bool> {
    self
      .execute_scoped(
        "DELETE FROM petitions WHERE petition_id = ?1 AND user_id = ?2",
        vec![Value::from(encode_uuid(petition_id)), Value::from(encode_uuid(owner))],
      )
      .await
  }

  async fn search_petitions(
    &self,
    owner: Uuid,
    text: String,
    limit: usize,
  ) -> Result<Vec<Petition>> {
    self
      .query_petitions(
        format!(
          "SELECT {PETITION_COLUMNS} FROM petitions WHERE user_id = ?1 AND (
             lower(title) LIKE ?2 ESCAPE '\\'
             OR lower(description) LIKE ?2 ESCAPE '\\'
           )
           ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        ),
        vec![
          Value::from(encode_uuid(owner)),
          Value::from(like_pattern(&text)),
          Value::from(limit_param(Some(limit))),
        ],
      )
      .await
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn create_document(&self, input: NewDocument) -> Result<Document> {
    input.validate()?;

    let now = Utc::now();
    let doc = Document {
      document_id:  Uuid::new_v4(),
      user_id:      input.user_id,
      case_id:      input.case_id,
      petition_id:  input.petition_id,
      file_name:    input.file_name,
      file_path:    input.file_path,
      mime_type:    input.mime_type,
      file_size:    input.file_size,
      category:     input.category,
      description:  input.description,
      version:      1,
      access_level: AccessLevel::default(),
      shared_with:  Vec::new(),
      sha256:       input.sha256,
      is_deleted:   false,
      deleted_at:   None,
      deleted_by:   None,
      created_at:   now,
      updated_at:   now,
    };

    let id_str       = encode_uuid(doc.document_id);
    let user_str     = encode_uuid(doc.user_id);
    let case_str     = doc.case_id.map(encode_uuid);
    let petition_str = doc.petition_id.map(encode_uuid);
    let file_name    = doc.file_name.clone();
    let file_path    = doc.file_path.clone();
    let mime_type    = doc.mime_type.clone();
    let size         = encode_size(doc.file_size)?;
    let category     = doc.category.map(|c| c.as_str());
    let description  = doc.description.clone();
    let access_str   = doc.access_level.as_str();
    let shared_json  = serde_json::to_string(&doc.shared_with)?;
    let sha256       = doc.sha256.clone();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (
             document_id, user_id, case_id, petition_id, file_name, file_path,
             mime_type, file_size, category, description, version, access_level,
             shared_with, sha256, is_deleted, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12, ?13, 0, ?14, ?14)",
          rusqlite::params![
            id_str, user_str, case_str, petition_str, file_name, file_path,
            mime_type, size, category, description, access_str, shared_json,
            sha256, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(document_id = %doc.document_id, "document metadata stored");
    Ok(doc)
  }

  async fn find_active_document(&self, document_id: Uuid) -> Result<Option<Document>> {
    let mut found = self
      .query_documents(
        format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1 AND is_deleted = 0"
        ),
        vec![Value::from(encode_uuid(document_id))],
      )
      .await?;
    Ok(found.pop())
  }

  async fn find_active_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>> {
    // Each optional filter is `?n IS NULL OR column = ?n` so the parameter
    // list stays fixed.
    self
      .query_documents(
        format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents
           WHERE is_deleted = 0
             AND (?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR case_id = ?2)
             AND (?3 IS NULL OR petition_id = ?3)
           ORDER BY created_at DESC, rowid DESC LIMIT ?4"
        ),
        vec![
          Value::from(filter.user_id.map(encode_uuid)),
          Value::from(filter.case_id.map(encode_uuid)),
          Value::from(filter.petition_id.map(encode_uuid)),
          Value::from(limit_param(filter.limit)),
        ],
      )
      .await
  }

  async fn soft_delete_document(
    &self,
    document_id: Uuid,
    owner: Uuid,
    at: DateTime<Utc>,
  ) -> Result<bool> {
    self
      .execute_scoped(
        "UPDATE documents SET is_deleted = 1, deleted_at = ?3, deleted_by = ?2, updated_at = ?3
         WHERE document_id = ?1 AND user_id = ?2 AND is_deleted = 0",
        vec![
          Value::from(encode_uuid(document_id)),
          Value::from(encode_uuid(owner)),
          Value::from(encode_dt(at)),
        ],
      )
      .await
  }

  async fn list_deleted_documents(&self, before: DateTime<Utc>) -> Result<Vec<Document>> {
    self
      .query_documents(
        format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents
           WHERE is_deleted = 1 AND deleted_at < ?1
           ORDER BY deleted_at"
        ),
        vec![Value::from(encode_dt(before))],
      )
      .await
  }

  async fn purge_document(&self, document_id: Uuid) -> Result<bool> {
    self
      .execute_scoped(
        "DELETE FROM documents WHERE document_id = ?1 AND is_deleted = 1",
        vec![Value::from(encode_uuid(document_id))],
      )
      .await
  }
}
