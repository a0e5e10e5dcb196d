//! Cases: tracked legal matters with court, docket and hearing metadata.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{
  ValidationErrors, label, max_len, optional_date, required, trimmed,
};

labelled_enum! {
  pub enum CaseType {
    Civil          => "Civil",
    Criminal       => "Criminal",
    Family         => "Family",
    Constitutional => "Constitutional",
    Commercial     => "Commercial",
    Labor          => "Labor",
    Tax            => "Tax",
    Property       => "Property",
    Other          => "Other",
  }
}

labelled_enum! {
  /// No transition graph is enforced: the owner may set any status at any
  /// time.
  pub enum CaseStatus {
    Pending  => "Pending",
    Active   => "Active",
    Upcoming => "Upcoming",
    Closed   => "Closed",
  }
}

impl Default for CaseStatus {
  fn default() -> Self { CaseStatus::Pending }
}

// ─── Sub-records ─────────────────────────────────────────────────────────────

/// One dated step in a case's history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub date:        NaiveDate,
  pub action:      String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub date:    DateTime<Utc>,
  pub message: String,
  pub is_read: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
  pub plaintiff: Option<String>,
  pub defendant: Option<String>,
}

// ─── Case ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Case {
  pub case_id:       Uuid,
  /// Owner; never changes after creation.
  pub user_id:       Uuid,
  pub title:         String,
  pub description:   Option<String>,
  pub case_type:     CaseType,
  pub court:         String,
  /// Stored uppercased; unique per court.
  pub case_number:   String,
  pub parties:       Parties,
  pub filing_date:   Option<NaiveDate>,
  pub next_hearing:  Option<NaiveDate>,
  pub status:        CaseStatus,
  pub timeline:      Vec<TimelineEntry>,
  pub notifications: Vec<Notification>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::LegalStore::create_case`].
#[derive(Debug, Clone)]
pub struct NewCase {
  pub user_id:      Uuid,
  pub title:        String,
  pub description:  Option<String>,
  pub case_type:    CaseType,
  pub court:        String,
  pub case_number:  String,
  pub parties:      Parties,
  pub filing_date:  Option<NaiveDate>,
  pub next_hearing: Option<NaiveDate>,
}

/// Per-owner counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaseStats {
  pub total:    u64,
  pub pending:  u64,
  pub closed:   u64,
  /// Cases whose next hearing is today or later.
  pub upcoming: u64,
}

// ─── Forms ───────────────────────────────────────────────────────────────────

/// `POST /dashboard/add-case` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseForm {
  #[serde(default)]
  pub title:        String,
  pub description:  Option<String>,
  #[serde(default, rename = "type")]
  pub case_type:    String,
  #[serde(default)]
  pub court:        String,
  #[serde(default)]
  pub case_number:  String,
  pub plaintiff:    Option<String>,
  pub defendant:    Option<String>,
  pub filing_date:  Option<String>,
  pub next_hearing: Option<String>,
}

impl CaseForm {
  pub fn validate(self, user_id: Uuid) -> Result<NewCase, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = required(&mut errors, "title", &self.title, "Title");
    max_len(&mut errors, "title", &title, 200, "Title");

    let description = trimmed(self.description);
    if let Some(d) = &description {
      max_len(&mut errors, "description", d, 1000, "Description");
    }

    let case_type = if self.case_type.trim().is_empty() {
      errors.push("type", "Case type is required");
      None
    } else {
      label::<CaseType>(
        &mut errors,
        "type",
        &self.case_type,
        "Case type must be one of: Civil, Criminal, Family, Constitutional, \
         Commercial, Labor, Tax, Property, Other",
      )
    };

    let court = required(&mut errors, "court", &self.court, "Court name");
    max_len(&mut errors, "court", &court, 100, "Court name");

    let case_number = required(&mut errors, "caseNumber", &self.case_number, "Case number")
      .to_uppercase();
    max_len(&mut errors, "caseNumber", &case_number, 50, "Case number");

    let filing_date =
      optional_date(&mut errors, "filingDate", self.filing_date, "Filing date");
    let next_hearing =
      optional_date(&mut errors, "nextHearing", self.next_hearing, "Next hearing");

    let parties = Parties {
      plaintiff: trimmed(self.plaintiff),
      defendant: trimmed(self.defendant),
    };

    match case_type {
      Some(case_type) if errors.is_empty() => Ok(NewCase {
        user_id,
        title,
        description,
        case_type,
        court,
        case_number,
        parties,
        filing_date,
        next_hearing,
      }),
      _ => Err(errors),
    }
  }
}

/// `POST /cases/{id}/add-event` body.
#[derive(Debug, Default, Deserialize)]
pub struct TimelineForm {
  #[serde(default)]
  pub action:      String,
  pub description: Option<String>,
  pub date:        Option<String>,
}

impl TimelineForm {
  /// `today` is used when the form leaves the date blank.
  pub fn validate(self, today: NaiveDate) -> Result<TimelineEntry, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let action = required(&mut errors, "action", &self.action, "Action");
    max_len(&mut errors, "action", &action, 200, "Action");
    let description = trimmed(self.description);
    if let Some(d) = &description {
      max_len(&mut errors, "description", d, 1000, "Description");
    }
    let date = optional_date(&mut errors, "date", self.date, "Date").unwrap_or(today);
    errors.finish(TimelineEntry { date, action, description })
  }
}

/// Body of the `change-status` routes for both cases and petitions.
#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
  #[serde(default)]
  pub status: String,
}

impl StatusForm {
  pub fn parse<T: std::str::FromStr>(&self) -> Result<T, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let status = label::<T>(&mut errors, "status", &self.status, "Invalid status");
    match status {
      Some(s) => Ok(s),
      None => Err(errors),
    }
  }
}
