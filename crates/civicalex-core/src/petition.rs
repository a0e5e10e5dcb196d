//! Petitions: drafted legal filings, optionally tied to a case.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{
  ValidationErrors, label, max_len, optional_date, optional_id, required, trimmed,
};

labelled_enum! {
  pub enum PetitionType {
    CivilWrit              => "Civil Writ",
    CriminalPetition       => "Criminal Petition",
    PublicInterest         => "Public Interest Petition",
    AdministrativeRequest  => "Administrative Request",
    ConstitutionalPetition => "Constitutional Petition",
    CommercialPetition     => "Commercial Petition",
  }
}

labelled_enum! {
  /// Only `Draft -> Submitted` is guarded (see
  /// [`crate::store::LegalStore::submit_petition`]); every other change is a
  /// plain write.
  pub enum PetitionStatus {
    Draft       => "Draft",
    Submitted   => "Submitted",
    Approved    => "Approved",
    Regret      => "Regret",
    UnderReview => "Under Review",
  }
}

impl Default for PetitionStatus {
  fn default() -> Self { PetitionStatus::Draft }
}

#[derive(Debug, Clone, Serialize)]
pub struct Petition {
  pub petition_id:   Uuid,
  pub user_id:       Uuid,
  pub case_id:       Option<Uuid>,
  pub title:         String,
  pub description:   String,
  pub petition_type: PetitionType,
  pub status:        PetitionStatus,
  pub court:         Option<String>,
  pub case_number:   Option<String>,
  /// Set when the petition is submitted, unless given at creation.
  pub filing_date:   Option<NaiveDate>,
  pub next_hearing:  Option<NaiveDate>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::LegalStore::create_petition`]. A `case_id`, if
/// present, must already have been checked against the owner.
#[derive(Debug, Clone)]
pub struct NewPetition {
  pub user_id:       Uuid,
  pub case_id:       Option<Uuid>,
  pub title:         String,
  pub description:   String,
  pub petition_type: PetitionType,
  pub court:         Option<String>,
  pub case_number:   Option<String>,
  pub filing_date:   Option<NaiveDate>,
  pub next_hearing:  Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PetitionStats {
  pub total:     u64,
  pub drafted:   u64,
  pub submitted: u64,
  pub approved:  u64,
}

/// `POST /dashboard/add-petition` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionForm {
  #[serde(default)]
  pub title:         String,
  #[serde(default)]
  pub description:   String,
  #[serde(default, rename = "type")]
  pub petition_type: String,
  pub court:         Option<String>,
  pub case_number:   Option<String>,
  pub filing_date:   Option<String>,
  pub next_hearing:  Option<String>,
  pub case_id:       Option<String>,
}

impl PetitionForm {
  pub fn validate(self, user_id: Uuid) -> Result<NewPetition, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = required(&mut errors, "title", &self.title, "Title");
    max_len(&mut errors, "title", &title, 200, "Title");

    let description = required(&mut errors, "description", &self.description, "Description");
    max_len(&mut errors, "description", &description, 2000, "Description");

    let petition_type = if self.petition_type.trim().is_empty() {
      errors.push("type", "Petition type is required");
      None
    } else {
      label::<PetitionType>(&mut errors, "type", &self.petition_type, "Invalid petition type")
    };

    let court = trimmed(self.court);
    if let Some(c) = &court {
      max_len(&mut errors, "court", c, 100, "Court name");
    }
    let case_number = trimmed(self.case_number).map(|n| n.to_uppercase());
    if let Some(n) = &case_number {
      max_len(&mut errors, "caseNumber", n, 50, "Case number");
    }

    let filing_date =
      optional_date(&mut errors, "filingDate", self.filing_date, "Filing date");
    let next_hearing =
      optional_date(&mut errors, "nextHearing", self.next_hearing, "Next hearing");
    let case_id = optional_id(&mut errors, "caseId", self.case_id, "case");

    match petition_type {
      Some(petition_type) if errors.is_empty() => Ok(NewPetition {
        user_id,
        case_id,
        title,
        description,
        petition_type,
        court,
        case_number,
        filing_date,
        next_hearing,
      }),
      _ => Err(errors),
    }
  }
}
