//! The `LegalStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `civicalex-store-sqlite`). Higher layers (`civicalex-api`,
//! `civicalex-web`) depend on this abstraction, not on any concrete backend.
//!
//! Every read or write of a case, petition or document record takes the
//! owner's id and is scoped to it inside the query itself. A `false` or
//! `None` result therefore means "not found *or* not yours", and callers
//! must not try to tell the two apart.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  case::{Case, CaseStats, CaseStatus, NewCase, TimelineEntry},
  document::{Document, DocumentFilter, NewDocument},
  petition::{NewPetition, Petition, PetitionStats, PetitionStatus},
  session::Session,
  user::{NewUser, ProfileUpdate, User},
};

/// Abstraction over a CivicaLex storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LegalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert a user. Returns `None` if the email is already registered.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up by normalised email.
  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn record_login(
    &self,
    user_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn update_profile(
    &self,
    user_id: Uuid,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Replace the password hash and stamp `password_changed_at`.
  fn set_password_hash(
    &self,
    user_id: Uuid,
    password_hash: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn create_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a session that has not expired as of `now`.
  fn get_session(
    &self,
    session_id: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Slide a session's expiry forward.
  fn touch_session(
    &self,
    session_id: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_session(
    &self,
    session_id: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every session expired as of `now`; returns how many went.
  fn purge_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Insert a case. Returns `None` if the `(court, case_number)` pair is
  /// already taken.
  fn create_case(
    &self,
    input: NewCase,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  fn get_case(
    &self,
    case_id: Uuid,
    owner: Uuid,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  /// The owner's cases, newest first.
  fn list_cases(
    &self,
    owner: Uuid,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + '_;

  fn case_stats(
    &self,
    owner: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<CaseStats, Self::Error>> + Send + '_;

  /// Set the status and append a "Status changed to X" notification.
  fn set_case_status(
    &self,
    case_id: Uuid,
    owner: Uuid,
    status: CaseStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn append_timeline(
    &self,
    case_id: Uuid,
    owner: Uuid,
    entry: TimelineEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn mark_case_notifications_read(
    &self,
    case_id: Uuid,
    owner: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Hard delete. Linked documents are left alone.
  fn delete_case(
    &self,
    case_id: Uuid,
    owner: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Case-insensitive substring match on title, description and case number.
  fn search_cases(
    &self,
    owner: Uuid,
    text: String,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + '_;

  // ── Petitions ─────────────────────────────────────────────────────────

  fn create_petition(
    &self,
    input: NewPetition,
  ) -> impl Future<Output = Result<Petition, Self::Error>> + Send + '_;

  fn get_petition(
    &self,
    petition_id: Uuid,
    owner: Uuid,
  ) -> impl Future<Output = Result<Option<Petition>, Self::Error>> + Send + '_;

  /// The owner's petitions, newest first.
  fn list_petitions(
    &self,
    owner: Uuid,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Petition>, Self::Error>> + Send + '_;

  fn petition_stats(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<PetitionStats, Self::Error>> + Send + '_;

  fn set_petition_status(
    &self,
    petition_id: Uuid,
    owner: Uuid,
    status: PetitionStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// `Draft -> Submitted`, stamping `filing_date = today`. A single
  /// conditional update: returns `false` unless the petition exists, is
  /// owned by `owner` and is still a draft.
  fn submit_petition(
    &self,
    petition_id: Uuid,
    owner: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_petition(
    &self,
    petition_id: Uuid,
    owner: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Case-insensitive substring match on title and description.
  fn search_petitions(
    &self,
    owner: Uuid,
    text: String,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Petition>, Self::Error>> + Send + '_;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Insert document metadata. The input is validated again here; a
  /// document that breaks an invariant is never stored.
  fn create_document(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Fetch a document that is not soft-deleted. Ownership is *not* checked
  /// here; see [`Document::access_for`].
  fn find_active_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// Newest first.
  fn find_active_documents(
    &self,
    filter: DocumentFilter,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Flag the document deleted. Only the owner's active documents match.
  fn soft_delete_document(
    &self,
    document_id: Uuid,
    owner: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Soft-deleted documents whose `deleted_at` is before `before`.
  fn list_deleted_documents(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Remove a soft-deleted document's row for good.
  fn purge_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
