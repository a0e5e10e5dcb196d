//! Private custody of uploaded files.
//!
//! Files live in one flat directory, named `<uuid>.<ext>`, outside anything
//! the server serves statically. An upload streams into a `.partial` file
//! while its SHA-256 and size are computed; the partial is renamed into place
//! only after every check has passed, and removed on any failure.
//!
//! Authorization is owner-only. The share list on a document is stored but
//! not consulted.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, multipart::MultipartError};
use chrono::{DateTime, Utc};
use civicalex_core::{
  ValidationErrors,
  document::{Access, Document, NewDocument, UploadForm, mime_for_extension},
  store::LegalStore,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a client sees for a document it may not touch, whether or not the
/// document exists.
pub const ACCESS_DENIED: &str = "Document not found or access denied";

#[derive(Debug, Error)]
pub enum CustodyError {
  #[error("document not found")]
  NotFound,
  #[error("document belongs to another user")]
  Forbidden,
  #[error("{0}")]
  LinkDenied(&'static str),
  #[error(transparent)]
  Validation(#[from] ValidationErrors),
  #[error("stored file is missing")]
  FileMissing,
  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn store_err<E>(e: E) -> CustodyError
where
  E: std::error::Error + Send + Sync + 'static,
{
  CustodyError::Store(Box::new(e))
}

fn io_err(context: &str, e: std::io::Error) -> CustodyError {
  CustodyError::StorageUnavailable(format!("{context}: {e}"))
}

fn rejected(message: impl Into<String>) -> CustodyError {
  CustodyError::Validation(ValidationErrors::single("document", message))
}

fn malformed(e: MultipartError) -> CustodyError {
  debug!(error = %e, "unreadable multipart body");
  rejected("The upload could not be read")
}

// ─── Custody ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Custody {
  root:      PathBuf,
  max_bytes: u64,
}

impl Custody {
  /// Use `root` as the upload directory, creating it if needed.
  pub async fn open(root: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, CustodyError> {
    let root = root.into();
    fs::create_dir_all(&root)
      .await
      .map_err(|e| io_err(&format!("cannot create {}", root.display()), e))?;
    info!(path = %root.display(), "upload directory ready");
    Ok(Self {
      root,
      max_bytes: max_bytes.min(civicalex_core::document::MAX_FILE_SIZE),
    })
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn max_bytes(&self) -> u64 { self.max_bytes }

  /// Resolve a stored name. Anything that is not a single plain component
  /// is refused.
  fn path_for(&self, name: &str) -> Result<PathBuf, CustodyError> {
    if !civicalex_core::document::is_safe_storage_name(name) {
      return Err(CustodyError::StorageUnavailable(format!(
        "refusing unsafe storage name {name:?}"
      )));
    }
    Ok(self.root.join(name))
  }

  pub async fn begin(&self) -> Result<PartialUpload, CustodyError> {
    let path = self.root.join(format!("{}.partial", Uuid::new_v4()));
    let file = fs::File::create(&path)
      .await
      .map_err(|e| io_err("cannot create partial upload", e))?;
    Ok(PartialUpload {
      root: self.root.clone(),
      path,
      file,
      hasher: Sha256::new(),
      size: 0,
      max_bytes: self.max_bytes,
      committed: false,
    })
  }

  pub async fn exists(&self, name: &str) -> bool {
    match self.path_for(name) {
      Ok(path) => fs::try_exists(path).await.unwrap_or(false),
      Err(_) => false,
    }
  }

  pub async fn read(&self, name: &str) -> Result<Vec<u8>, CustodyError> {
    let path = self.path_for(name)?;
    match fs::read(&path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CustodyError::FileMissing),
      Err(e) => Err(io_err("cannot read stored file", e)),
    }
  }

  /// Remove a stored file. `Ok(false)` if it was already gone.
  pub async fn remove(&self, name: &str) -> Result<bool, CustodyError> {
    let path = self.path_for(name)?;
    match fs::remove_file(&path).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(io_err("cannot remove stored file", e)),
    }
  }
}

// ─── Partial uploads ──────────────────────────────────────────────────────────

/// A file being received. Dropping it without [`PartialUpload::commit`]
/// deletes what was written so far.
pub struct PartialUpload {
  root:      PathBuf,
  path:      PathBuf,
  file:      fs::File,
  hasher:    Sha256,
  size:      u64,
  max_bytes: u64,
  committed: bool,
}

/// A committed file: its storage name, size and content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
  pub file_path: String,
  pub size:      u64,
  pub sha256:    String,
}

impl PartialUpload {
  pub async fn write(&mut self, chunk: &[u8]) -> Result<(), CustodyError> {
    self.size += chunk.len() as u64;
    if self.size > self.max_bytes {
      return Err(rejected(format!(
        "File exceeds the {} MB limit",
        self.max_bytes / (1024 * 1024)
      )));
    }
    self.hasher.update(chunk);
    self
      .file
      .write_all(chunk)
      .await
      .map_err(|e| io_err("cannot write partial upload", e))
  }

  pub fn size(&self) -> u64 { self.size }

  /// Move the partial file to `name` inside the upload directory.
  pub async fn commit(mut self, name: &str) -> Result<StoredFile, CustodyError> {
    self
      .file
      .sync_all()
      .await
      .map_err(|e| io_err("cannot flush partial upload", e))?;
    fs::rename(&self.path, self.root.join(name))
      .await
      .map_err(|e| io_err("cannot move upload into place", e))?;
    self.committed = true;
    Ok(StoredFile {
      file_path: name.to_owned(),
      size:      self.size,
      sha256:    hex::encode(std::mem::take(&mut self.hasher).finalize()),
    })
  }
}

impl Drop for PartialUpload {
  fn drop(&mut self) {
    if self.committed {
      return;
    }
    if let Err(e) = std::fs::remove_file(&self.path)
      && e.kind() != std::io::ErrorKind::NotFound
    {
      warn!(path = %self.path.display(), error = %e, "cannot remove partial upload");
    }
  }
}

// ─── Ingest ───────────────────────────────────────────────────────────────────

struct Incoming {
  partial:   PartialUpload,
  file_name: String,
  extension: String,
  mime_type: &'static str,
}

/// Check the name and content type a client declared for a file. Returns the
/// display name, lowercased extension and the canonical mime type.
pub fn check_declared(
  file_name: Option<&str>,
  content_type: Option<&str>,
) -> Result<(String, String, &'static str), CustodyError> {
  let file_name = file_name
    .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n).trim())
    .filter(|n| !n.is_empty())
    .ok_or_else(|| rejected("No file uploaded"))?;

  let extension = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  let mime_type = mime_for_extension(&extension).ok_or_else(|| {
    rejected("Invalid file type. Only PDF, DOC, DOCX, TXT, JPG, PNG and GIF files are allowed")
  })?;

  let declared = content_type
    .and_then(|c| c.split(';').next())
    .map(str::trim)
    .unwrap_or_default();
  if !declared.eq_ignore_ascii_case(mime_type) {
    return Err(rejected("File type does not match its extension"));
  }

  Ok((file_name.to_owned(), extension, mime_type))
}

/// Receive a multipart upload for `owner` and record it.
///
/// Nothing is stored unless the file passes every check and each linked case
/// or petition belongs to `owner`.
pub async fn ingest<S>(
  store: &S,
  custody: &Custody,
  owner: Uuid,
  mut multipart: Multipart,
) -> Result<Document, CustodyError>
where
  S: LegalStore,
{
  let mut form = UploadForm::default();
  let mut incoming: Option<Incoming> = None;

  while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
    let name = field.name().unwrap_or_default().to_owned();
    match name.as_str() {
      "document" => {
        if incoming.is_some() {
          return Err(rejected("Only one file may be uploaded at a time"));
        }
        let (file_name, extension, mime_type) =
          check_declared(field.file_name(), field.content_type())?;
        let mut partial = custody.begin().await?;
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
          partial.write(&chunk).await?;
        }
        incoming = Some(Incoming { partial, file_name, extension, mime_type });
      }
      "caseId" => form.case_id = Some(field.text().await.map_err(malformed)?),
      "petitionId" => form.petition_id = Some(field.text().await.map_err(malformed)?),
      "category" => form.category = Some(field.text().await.map_err(malformed)?),
      "description" => form.description = Some(field.text().await.map_err(malformed)?),
      _ => {}
    }
  }

  let incoming = incoming.ok_or_else(|| rejected("No file uploaded"))?;
  if incoming.partial.size() == 0 {
    return Err(rejected("File is empty"));
  }
  let meta = form.validate()?;

  if let Some(case_id) = meta.case_id
    && store.get_case(case_id, owner).await.map_err(store_err)?.is_none()
  {
    warn!(user_id = %owner, case_id = %case_id, "upload linked to a case the user does not own");
    return Err(CustodyError::LinkDenied("Invalid case ID or access denied"));
  }
  if let Some(petition_id) = meta.petition_id
    && store
      .get_petition(petition_id, owner)
      .await
      .map_err(store_err)?
      .is_none()
  {
    warn!(user_id = %owner, petition_id = %petition_id, "upload linked to a petition the user does not own");
    return Err(CustodyError::LinkDenied("Invalid petition ID or access denied"));
  }

  let Incoming { partial, file_name, extension, mime_type } = incoming;
  let storage_name = format!("{}.{extension}", Uuid::new_v4());
  let hash = partial.hasher.clone().finalize();

  let new_doc = NewDocument {
    user_id: owner,
    case_id: meta.case_id,
    petition_id: meta.petition_id,
    file_name,
    file_path: storage_name.clone(),
    mime_type: mime_type.to_owned(),
    file_size: partial.size(),
    category: meta.category,
    description: meta.description,
    sha256: hex::encode(hash),
  };
  new_doc.validate()?;

  partial.commit(&storage_name).await?;
  match store.create_document(new_doc).await {
    Ok(doc) => {
      info!(
        user_id = %owner,
        document_id = %doc.document_id,
        size = doc.file_size,
        "document stored"
      );
      Ok(doc)
    }
    Err(e) => {
      if let Err(cleanup) = custody.remove(&storage_name).await {
        warn!(error = %cleanup, "cannot remove file after failed insert");
      }
      Err(store_err(e))
    }
  }
}

// ─── Retrieval, deletion, purge ──────────────────────────────────────────────

/// Fetch an active document `user_id` may access.
pub async fn authorize<S>(
  store: &S,
  user_id: Uuid,
  document_id: Uuid,
) -> Result<Document, CustodyError>
where
  S: LegalStore,
{
  let Some(doc) = store
    .find_active_document(document_id)
    .await
    .map_err(store_err)?
  else {
    debug!(user_id = %user_id, document_id = %document_id, "document not found");
    return Err(CustodyError::NotFound);
  };
  match doc.access_for(user_id) {
    Access::Granted => Ok(doc),
    Access::Denied => {
      warn!(user_id = %user_id, document_id = %document_id, "document access denied");
      Err(CustodyError::Forbidden)
    }
  }
}

/// Soft-delete a document. The file stays on disk until a purge.
pub async fn soft_delete<S>(
  store: &S,
  custody: &Custody,
  user_id: Uuid,
  document_id: Uuid,
) -> Result<(), CustodyError>
where
  S: LegalStore,
{
  let doc = authorize(store, user_id, document_id).await?;
  if !custody.exists(&doc.file_path).await {
    warn!(document_id = %document_id, "stored file already missing at delete");
  }
  let deleted = store
    .soft_delete_document(document_id, user_id, Utc::now())
    .await
    .map_err(store_err)?;
  if !deleted {
    // Lost a race with another delete.
    return Err(CustodyError::NotFound);
  }
  info!(user_id = %user_id, document_id = %document_id, "document soft-deleted");
  Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
  pub purged:        u64,
  pub missing_files: u64,
}

/// Remove files and rows of documents soft-deleted before `before`.
pub async fn purge_deleted<S>(
  store: &S,
  custody: &Custody,
  before: DateTime<Utc>,
) -> Result<PurgeReport, CustodyError>
where
  S: LegalStore,
{
  let mut report = PurgeReport::default();
  for doc in store.list_deleted_documents(before).await.map_err(store_err)? {
    if !custody.remove(&doc.file_path).await? {
      warn!(document_id = %doc.document_id, "file already gone at purge");
      report.missing_files += 1;
    }
    if store.purge_document(doc.document_id).await.map_err(store_err)? {
      report.purged += 1;
    }
  }
  info!(purged = report.purged, missing_files = report.missing_files, "purge complete");
  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use civicalex_core::{
    case::{CaseForm, CaseStatus},
    document::DocumentFilter,
    user::NewUser,
  };
  use civicalex_store_sqlite::SqliteStore;
  use tempfile::TempDir;

  /// Documents reference their owner, so every owner must be a real account.
  async fn account(store: &SqliteStore, email: &str) -> Uuid {
    store
      .create_user(NewUser {
        name:          "Asha Rao".into(),
        email:         email.into(),
        password_hash: "$argon2id$v=19$fake".into(),
        phone:         None,
        address:       None,
      })
      .await
      .unwrap()
      .unwrap()
      .user_id
  }

  async fn custody() -> (TempDir, Custody) {
    let dir = TempDir::new().unwrap();
    let custody = Custody::open(dir.path().join("uploads"), 1024).await.unwrap();
    (dir, custody)
  }

  fn entries(custody: &Custody) -> Vec<String> {
    std::fs::read_dir(custody.root())
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect()
  }

  #[tokio::test]
  async fn commit_hashes_and_renames() {
    let (_dir, custody) = custody().await;
    let mut partial = custody.begin().await.unwrap();
    partial.write(b"hello ").await.unwrap();
    partial.write(b"world").await.unwrap();
    let stored = partial.commit("a.txt").await.unwrap();
    assert_eq!(stored.size, 11);
    assert_eq!(
      stored.sha256,
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
    assert_eq!(entries(&custody), vec!["a.txt".to_owned()]);
    assert_eq!(custody.read("a.txt").await.unwrap(), b"hello world");
  }

  #[tokio::test]
  async fn oversize_upload_leaves_nothing_behind() {
    let (_dir, custody) = custody().await;
    let mut partial = custody.begin().await.unwrap();
    partial.write(&[0u8; 1000]).await.unwrap();
    let err = partial.write(&[0u8; 100]).await.unwrap_err();
    assert!(matches!(err, CustodyError::Validation(_)));
    drop(partial);
    assert!(entries(&custody).is_empty());
  }

  #[tokio::test]
  async fn unsafe_names_are_refused() {
    let (_dir, custody) = custody().await;
    assert!(custody.read("../etc/passwd").await.is_err());
    assert!(!custody.exists("..").await);
    assert!(matches!(
      custody.read("missing.pdf").await,
      Err(CustodyError::FileMissing)
    ));
    assert!(!custody.remove("missing.pdf").await.unwrap());
  }

  #[test]
  fn declared_type_must_match_extension() {
    let (name, ext, mime) =
      check_declared(Some("C:\\docs\\Brief.PDF"), Some("application/pdf")).unwrap();
    assert_eq!((name.as_str(), ext.as_str(), mime), ("Brief.PDF", "pdf", "application/pdf"));

    assert!(check_declared(Some("brief.pdf"), Some("image/png")).is_err());
    assert!(check_declared(Some("run.exe"), Some("application/octet-stream")).is_err());
    assert!(check_declared(Some("noext"), Some("text/plain")).is_err());
    assert!(check_declared(None, Some("text/plain")).is_err());
  }

  #[tokio::test]
  async fn foreign_documents_look_like_missing_ones() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let owner = account(&store, "owner@x.com").await;
    let case = store
      .create_case(
        CaseForm {
          title: "Rent dispute".into(),
          case_type: "Civil".into(),
          court: "District Court".into(),
          case_number: "dc/2024/1".into(),
          ..Default::default()
        }
        .validate(owner)
        .unwrap(),
      )
      .await
      .unwrap()
      .unwrap();
    assert_eq!(case.status, CaseStatus::Pending);

    let doc = store
      .create_document(NewDocument {
        user_id:     owner,
        case_id:     Some(case.case_id),
        petition_id: None,
        file_name:   "brief.pdf".into(),
        file_path:   format!("{}.pdf", Uuid::new_v4()),
        mime_type:   "application/pdf".into(),
        file_size:   10,
        category:    None,
        description: None,
        sha256:      "0".repeat(64),
      })
      .await
      .unwrap();

    let stranger = account(&store, "stranger@x.com").await;
    assert!(matches!(
      authorize(&store, stranger, doc.document_id).await,
      Err(CustodyError::Forbidden)
    ));
    assert!(matches!(
      authorize(&store, stranger, Uuid::new_v4()).await,
      Err(CustodyError::NotFound)
    ));
    assert!(authorize(&store, owner, doc.document_id).await.is_ok());
  }

  #[tokio::test]
  async fn soft_delete_then_purge() {
    let (_dir, custody) = custody().await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let owner = account(&store, "owner@x.com").await;
    let stranger = account(&store, "stranger@x.com").await;
    let petition = store
      .create_petition(civicalex_core::petition::NewPetition {
        user_id:       owner,
        case_id:       None,
        title:         "Writ".into(),
        description:   "Relief sought".into(),
        petition_type: civicalex_core::petition::PetitionType::CivilWrit,
        court:         None,
        case_number:   None,
        filing_date:   None,
        next_hearing:  None,
      })
      .await
      .unwrap();

    let mut partial = custody.begin().await.unwrap();
    partial.write(b"%PDF-1.4").await.unwrap();
    let name = format!("{}.pdf", Uuid::new_v4());
    let stored = partial.commit(&name).await.unwrap();
    let doc = store
      .create_document(NewDocument {
        user_id:     owner,
        case_id:     None,
        petition_id: Some(petition.petition_id),
        file_name:   "writ.pdf".into(),
        file_path:   stored.file_path.clone(),
        mime_type:   "application/pdf".into(),
        file_size:   stored.size,
        category:    None,
        description: None,
        sha256:      stored.sha256,
      })
      .await
      .unwrap();

    // A stranger cannot delete it.
    assert!(matches!(
      soft_delete(&store, &custody, stranger, doc.document_id).await,
      Err(CustodyError::Forbidden)
    ));

    soft_delete(&store, &custody, owner, doc.document_id).await.unwrap();
    let listed = store
      .find_active_documents(DocumentFilter { user_id: Some(owner), ..Default::default() })
      .await
      .unwrap();
    assert!(listed.is_empty());
    assert!(custody.exists(&name).await);

    // Purging with a cutoff in the past keeps it.
    let report = purge_deleted(&store, &custody, Utc::now() - chrono::Duration::days(1))
      .await
      .unwrap();
    assert_eq!(report.purged, 0);
    assert!(custody.exists(&name).await);

    let report = purge_deleted(&store, &custody, Utc::now() + chrono::Duration::seconds(1))
      .await
      .unwrap();
    assert_eq!(report, PurgeReport { purged: 1, missing_files: 0 });
    assert!(!custody.exists(&name).await);
  }
}
