//! Documents: uploaded files held in private custody.
//!
//! A [`Document`] is only metadata. The bytes live under the server's private
//! upload directory at [`Document::file_path`], a bare generated file name
//! that is never sent to clients. Every document belongs to exactly one owner
//! and is linked to a case, a petition, or both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{ValidationErrors, label, max_len, optional_id, trimmed};

/// Upload ceiling, in bytes.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// `(extension, mime)` pairs accepted for upload.
pub const ALLOWED_TYPES: &[(&str, &str)] = &[
  ("pdf", "application/pdf"),
  ("doc", "application/msword"),
  (
    "docx",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
  ),
  ("txt", "text/plain"),
  ("jpg", "image/jpeg"),
  ("jpeg", "image/jpeg"),
  ("png", "image/png"),
  ("gif", "image/gif"),
];

/// The mime type an allow-listed extension must be declared with.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
  let ext = ext.to_ascii_lowercase();
  ALLOWED_TYPES
    .iter()
    .find(|(e, _)| *e == ext)
    .map(|(_, m)| *m)
}

pub fn is_allowed_mime(mime: &str) -> bool {
  ALLOWED_TYPES.iter().any(|(_, m)| *m == mime)
}

/// PDFs and images render in the browser; everything else is downloaded.
pub fn is_inline_viewable(mime: &str) -> bool {
  mime == "application/pdf" || mime.starts_with("image/")
}

/// A storage name is a single path component with no traversal.
pub fn is_safe_storage_name(name: &str) -> bool {
  !name.is_empty()
    && !name.contains("..")
    && !name.contains('/')
    && !name.contains('\\')
    && !name.contains('\0')
}

pub fn is_sha256_hex(s: &str) -> bool {
  s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

labelled_enum! {
  pub enum DocumentCategory {
    Evidence  => "Evidence",
    Affidavit => "Affidavit",
    Notice    => "Notice",
    Order     => "Order",
    Petition  => "Petition",
    Judgment  => "Judgment",
    Contract  => "Contract",
    Agreement => "Agreement",
    Other     => "Other",
  }
}

labelled_enum! {
  pub enum AccessLevel {
    Private => "Private",
    Shared  => "Shared",
    Public  => "Public",
  }
}

impl Default for AccessLevel {
  fn default() -> Self { AccessLevel::Private }
}

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Document {
  pub document_id:  Uuid,
  pub user_id:      Uuid,
  pub case_id:      Option<Uuid>,
  pub petition_id:  Option<Uuid>,
  /// Name the file was uploaded under. Display only.
  pub file_name:    String,
  #[serde(skip_serializing)]
  pub file_path:    String,
  pub mime_type:    String,
  pub file_size:    u64,
  pub category:     Option<DocumentCategory>,
  pub description:  Option<String>,
  pub version:      u32,
  pub access_level: AccessLevel,
  /// Recorded but not consulted by [`Document::access_for`].
  pub shared_with:  Vec<Uuid>,
  pub sha256:       String,
  pub is_deleted:   bool,
  pub deleted_at:   Option<DateTime<Utc>>,
  pub deleted_by:   Option<Uuid>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Outcome of an authorization check against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Granted,
  Denied,
}

impl Document {
  /// Only the owner may read or delete a document. Soft-deleted documents
  /// are denied to everyone.
  pub fn access_for(&self, user_id: Uuid) -> Access {
    if !self.is_deleted && self.user_id == user_id {
      Access::Granted
    } else {
      Access::Denied
    }
  }
}

/// Input to [`crate::store::LegalStore::create_document`].
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub user_id:     Uuid,
  pub case_id:     Option<Uuid>,
  pub petition_id: Option<Uuid>,
  pub file_name:   String,
  pub file_path:   String,
  pub mime_type:   String,
  pub file_size:   u64,
  pub category:    Option<DocumentCategory>,
  pub description: Option<String>,
  pub sha256:      String,
}

impl NewDocument {
  /// Check every invariant a stored document must hold.
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if self.case_id.is_none() && self.petition_id.is_none() {
      errors.push("caseId", "Please select either a case or petition");
    }
    if self.file_name.trim().is_empty() {
      errors.push("document", "File name is required");
    }
    max_len(&mut errors, "document", &self.file_name, 200, "File name");
    if !is_safe_storage_name(&self.file_path) {
      errors.push("document", "Invalid storage path");
    }
    if !is_allowed_mime(&self.mime_type) {
      errors.push("document", "File type not allowed");
    }
    if self.file_size == 0 {
      errors.push("document", "File is empty");
    } else if self.file_size > MAX_FILE_SIZE {
      errors.push("document", "File exceeds the 10 MB limit");
    }
    if let Some(d) = &self.description {
      max_len(&mut errors, "description", d, 500, "Description");
    }
    if !is_sha256_hex(&self.sha256) {
      errors.push("document", "Invalid content hash");
    }
    errors.finish(())
  }
}

// ─── Forms and filters ───────────────────────────────────────────────────────

/// The text fields that accompany a multipart upload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
  pub case_id:     Option<String>,
  pub petition_id: Option<String>,
  pub category:    Option<String>,
  pub description: Option<String>,
}

/// Validated upload metadata. Ownership of the linked records is checked
/// separately against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMeta {
  pub case_id:     Option<Uuid>,
  pub petition_id: Option<Uuid>,
  pub category:    Option<DocumentCategory>,
  pub description: Option<String>,
}

impl UploadForm {
  pub fn validate(self) -> Result<UploadMeta, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let case_id = optional_id(&mut errors, "caseId", self.case_id, "case");
    let petition_id = optional_id(&mut errors, "petitionId", self.petition_id, "petition");
    if case_id.is_none() && petition_id.is_none() && errors.is_empty() {
      errors.push("caseId", "Please select either a case or petition");
    }
    let category = trimmed(self.category).and_then(|c| {
      label::<DocumentCategory>(&mut errors, "category", &c, "Invalid document category")
    });
    let description = trimmed(self.description);
    if let Some(d) = &description {
      max_len(&mut errors, "description", d, 500, "Description");
    }
    errors.finish(UploadMeta { case_id, petition_id, category, description })
  }
}

/// Selects active documents for [`crate::store::LegalStore::find_active_documents`].
/// Soft-deleted rows are always excluded.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
  pub user_id:     Option<Uuid>,
  pub case_id:     Option<Uuid>,
  pub petition_id: Option<Uuid>,
  pub limit:       Option<usize>,
}
