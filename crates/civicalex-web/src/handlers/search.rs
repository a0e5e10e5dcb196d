//! Site search across the acts catalogue and, when logged in, the caller's
//! own cases and petitions.

use axum::{
  Json,
  extract::{RawQuery, State},
};
use chrono::NaiveDate;
use civicalex_core::store::LegalStore;
use serde::Serialize;

use crate::{
  AppState,
  error::{Error, Result},
  session::RequestContext,
};

const RECORD_LIMIT: usize = 10;
const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
  pub title:     String,
  #[serde(rename = "type")]
  pub kind:      &'static str,
  pub snippet:   String,
  pub url:       String,
  pub date:      Option<NaiveDate>,
  pub relevance: u8,
}

#[derive(Debug, Serialize)]
pub struct SearchView {
  pub query:   String,
  pub filters: Vec<String>,
  pub total:   usize,
  pub items:   Vec<SearchResult>,
}

/// `q` and any number of `type` filters. No filter means everything.
pub fn parse_query(raw: Option<&str>) -> (String, Vec<String>) {
  let mut query = String::new();
  let mut filters = Vec::new();
  for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
    match key.as_ref() {
      "q" => query = value.trim().to_owned(),
      "type" => filters.push(value.into_owned()),
      _ => {}
    }
  }
  (query, filters)
}

fn wants(filters: &[String], kind: &str) -> bool {
  filters.is_empty() || filters.iter().any(|f| f == kind)
}

fn snippet(text: &str) -> String {
  let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
  out.push_str("...");
  out
}

pub async fn search<S>(
  State(state): State<AppState<S>>,
  ctx: RequestContext,
  RawQuery(raw): RawQuery,
) -> Result<Json<SearchView>>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (query, filters) = parse_query(raw.as_deref());
  let mut items = Vec::new();

  if query.is_empty() {
    return Ok(Json(SearchView { query, filters, total: 0, items }));
  }

  if wants(&filters, "acts") {
    items.extend(state.acts.search(&query).into_iter().map(|act| SearchResult {
      title:     act.name.clone(),
      kind:      "Act",
      snippet:   format!("Act {} of {}", act.number, act.year),
      url:       act.url(),
      date:      act.enacted(),
      relevance: 85,
    }));
  }

  if let Some(me) = ctx.identity {
    if wants(&filters, "cases") {
      let cases = state
        .store
        .search_cases(me.user_id, query.clone(), RECORD_LIMIT)
        .await
        .map_err(Error::store)?;
      items.extend(cases.into_iter().map(|c| SearchResult {
        snippet:   c
          .description
          .clone()
          .unwrap_or_else(|| format!("Case {}", c.case_number)),
        title:     c.title,
        kind:      "Case",
        url:       format!("/cases/{}", c.case_id),
        date:      Some(c.created_at.date_naive()),
        relevance: 90,
      }));
    }
    if wants(&filters, "petitions") {
      let petitions = state
        .store
        .search_petitions(me.user_id, query.clone(), RECORD_LIMIT)
        .await
        .map_err(Error::store)?;
      items.extend(petitions.into_iter().map(|p| SearchResult {
        snippet:   snippet(&p.description),
        title:     p.title,
        kind:      "Petition",
        url:       format!("/petitions/{}", p.petition_id),
        date:      Some(p.created_at.date_naive()),
        relevance: 88,
      }));
    }
  }

  // Stable: equal relevance keeps acts, cases, petitions in their own order.
  items.sort_by(|a, b| b.relevance.cmp(&a.relevance));
  Ok(Json(SearchView { query, filters, total: items.len(), items }))
}
