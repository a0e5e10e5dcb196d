//! Read-only catalogue of central and state legislation, bundled with the
//! binary.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const BUNDLED: &str = include_str!("../data/acts.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Act {
  pub id:     u32,
  pub name:   String,
  pub number: String,
  pub year:   i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub state:  Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActKind {
  Central,
  State,
}

impl FromStr for ActKind {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "central" => Ok(ActKind::Central),
      "state" => Ok(ActKind::State),
      _ => Err(()),
    }
  }
}

impl Act {
  pub fn kind(&self) -> ActKind {
    if self.state.is_some() { ActKind::State } else { ActKind::Central }
  }

  pub fn url(&self) -> String {
    match self.kind() {
      ActKind::Central => format!("/act/central/{}", self.id),
      ActKind::State => format!("/act/state/{}", self.id),
    }
  }

  pub fn enacted(&self) -> Option<NaiveDate> { NaiveDate::from_ymd_opt(self.year, 1, 1) }
}

/// An act with the descriptive fields the detail page shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActDetail<'a> {
  #[serde(flatten)]
  pub act:          &'a Act,
  #[serde(rename = "type")]
  pub kind:         &'static str,
  pub jurisdiction: String,
  pub status:       &'static str,
  pub description:  String,
  pub long_title:   String,
  pub source_url:   &'static str,
}

impl<'a> ActDetail<'a> {
  pub fn new(act: &'a Act) -> Self {
    let (kind, jurisdiction, description) = match &act.state {
      None => (
        "Central Act",
        "All India".to_owned(),
        format!("The {} is an important legislation enacted in {}.", act.name, act.year),
      ),
      Some(state) => (
        "State Act",
        state.clone(),
        format!("The {} is a state legislation enacted in {}.", act.name, act.year),
      ),
    };
    Self {
      act,
      kind,
      jurisdiction,
      status: "Active",
      description,
      long_title: format!("An Act to provide for {}", act.name.to_lowercase()),
      source_url: "https://legislative.gov.in",
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActCatalog {
  central: Vec<Act>,
  state:   Vec<Act>,
}

impl ActCatalog {
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    let mut catalog: ActCatalog = serde_json::from_str(raw)?;
    // A state act is one with a state; keep the two lists honest.
    catalog.central.retain(|a| a.state.is_none());
    catalog.state.retain(|a| a.state.is_some());
    Ok(catalog)
  }

  /// The catalogue compiled into the binary. Empty if it fails to parse.
  pub fn bundled() -> Self {
    Self::from_json(BUNDLED).unwrap_or_else(|e| {
      tracing::error!(error = %e, "bundled acts catalogue is invalid");
      Self::default()
    })
  }

  pub fn list(&self, kind: ActKind) -> &[Act] {
    match kind {
      ActKind::Central => &self.central,
      ActKind::State => &self.state,
    }
  }

  pub fn get(&self, kind: ActKind, id: u32) -> Option<&Act> {
    self.list(kind).iter().find(|a| a.id == id)
  }

  /// Acts whose name contains `query`, ignoring case. Central acts first.
  pub fn search(&self, query: &str) -> Vec<&Act> {
    let needle = query.to_lowercase();
    self
      .central
      .iter()
      .chain(&self.state)
      .filter(|a| a.name.to_lowercase().contains(&needle))
      .collect()
  }
}
