//! HTTP front end for CivicaLex.
//!
//! Exposes an axum [`Router`] serving the page routes (JSON view models),
//! document custody, the `/api` tree from `civicalex-api`, and the AI chat
//! relay, backed by any [`LegalStore`].
//!
//! Middleware, outermost first: panic catcher, tracing, security headers,
//! error-detail exposure, rate limiting, sessions, CSRF, body sanitization.

pub mod acts;
pub mod auth;
pub mod bridge;
pub mod csrf;
pub mod custody;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod sanitize;
pub mod session;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  http::{HeaderValue, header},
  middleware,
  routing::{get, post},
};
use civicalex_core::store::LegalStore;
use serde::Deserialize;
use tower_http::{
  catch_panic::CatchPanicLayer,
  set_header::SetResponseHeaderLayer,
  trace::TraceLayer,
};

use acts::ActCatalog;
use bridge::{BridgeConfig, BridgeHandle};
use custody::Custody;
use handlers::{
  acts as act_pages, auth as auth_pages, cases, chat, contact, dashboard, documents,
  petitions, profile, search,
};
use rate_limit::RateLimiter;

/// Ceiling for buffered request bodies.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Ceiling on the upload route; larger than a file may be so that oversize
/// files reach the custody check and get a proper answer.
pub const MAX_UPLOAD_BODY_BYTES: usize = 12 * 1024 * 1024;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
  style-src 'self' 'unsafe-inline'; \
  script-src 'self' 'unsafe-inline'; \
  img-src 'self' data: https:; \
  connect-src 'self'; \
  frame-ancestors 'none'";

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  #[default]
  Development,
  Production,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `CIVICALEX_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub environment:       Environment,
  pub database_path:     PathBuf,
  pub upload_dir:        PathBuf,
  pub max_upload_bytes:  u64,
  pub session_ttl_hours: i64,
  pub ai_bridge:         BridgeConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_owned(),
      port:              3000,
      environment:       Environment::Development,
      database_path:     PathBuf::from("civicalex.db"),
      upload_dir:        PathBuf::from("private_uploads"),
      max_upload_bytes:  civicalex_core::document::MAX_FILE_SIZE,
      session_ttl_hours: 24,
      ai_bridge:         BridgeConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn session_ttl(&self) -> chrono::Duration {
    chrono::Duration::hours(self.session_ttl_hours.max(1))
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: LegalStore> {
  pub store:   Arc<S>,
  pub config:  Arc<ServerConfig>,
  pub custody: Arc<Custody>,
  pub limiter: RateLimiter,
  pub bridge:  BridgeHandle,
  pub acts:    Arc<ActCatalog>,
}

impl<S: LegalStore> AppState<S> {
  pub fn new(
    store: S,
    config: ServerConfig,
    custody: Custody,
    bridge: BridgeHandle,
  ) -> Self {
    Self {
      store:   Arc::new(store),
      config:  Arc::new(config),
      custody: Arc::new(custody),
      limiter: RateLimiter::default(),
      bridge,
      acts:    Arc::new(ActCatalog::bundled()),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let api = Router::new()
    .route("/ai/chat", post(chat::chat::<S>))
    .with_state(state.clone())
    .merge(civicalex_api::api_router(state.store.clone()));

  let pages = Router::new()
    .route("/",                              get(handlers::home::<S>))
    .route("/health",                        get(handlers::health::<S>))
    .route("/login",                         get(auth_pages::login_page::<S>).post(auth_pages::login::<S>))
    .route("/register",                      get(auth_pages::register_page::<S>).post(auth_pages::register::<S>))
    .route("/logout",                        get(auth_pages::logout::<S>).post(auth_pages::logout::<S>))
    .route("/dashboard",                     get(dashboard::view::<S>))
    .route("/dashboard/add-case",            post(dashboard::add_case::<S>))
    .route("/dashboard/add-petition",        post(dashboard::add_petition::<S>))
    .route(
      "/dashboard/upload-document",
      post(dashboard::upload_document::<S>)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
    )
    .route("/cases/{id}",                    get(cases::detail::<S>))
    .route("/cases/{id}/add-event",          post(cases::add_event::<S>))
    .route("/cases/{id}/change-status",      post(cases::change_status::<S>))
    .route("/cases/{id}/notifications/read", post(cases::mark_read::<S>))
    .route("/cases/{id}/delete",             post(cases::delete::<S>))
    .route("/petitions/{id}",                get(petitions::detail::<S>))
    .route("/petitions/{id}/change-status",  post(petitions::change_status::<S>))
    .route("/petitions/{id}/submit",         post(petitions::submit::<S>))
    .route("/petitions/{id}/delete",         post(petitions::delete::<S>))
    .route("/documents/{id}/download",       get(documents::download::<S>))
    .route("/documents/{id}/view",           get(documents::view::<S>))
    .route("/documents/{id}/delete",         post(documents::delete::<S>))
    .route("/profile",                       get(profile::view::<S>))
    .route("/profile/update",                post(profile::update::<S>))
    .route("/profile/change-password",       post(profile::change_password::<S>))
    .route("/search",                        get(search::search::<S>))
    .route("/act/central",                   get(act_pages::list_central::<S>))
    .route("/act/state",                     get(act_pages::list_state::<S>))
    .route("/act/{kind}/{id}",               get(act_pages::detail::<S>))
    .route("/contact",                       get(contact::page::<S>).post(contact::submit))
    .fallback(handlers::not_found)
    .with_state(state.clone());

  pages
    .nest("/api", api)
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(middleware::from_fn(sanitize::middleware))
    .layer(middleware::from_fn(csrf::middleware))
    .layer(middleware::from_fn_with_state(state.clone(), session::middleware::<S>))
    .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit::middleware))
    .layer(middleware::from_fn_with_state(state.config.clone(), error::expose_error_detail))
    .layer(SetResponseHeaderLayer::overriding(
      header::CONTENT_SECURITY_POLICY,
      HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      header::X_FRAME_OPTIONS,
      HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      header::X_CONTENT_TYPE_OPTIONS,
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      header::REFERRER_POLICY,
      HeaderValue::from_static("no-referrer"),
    ))
    .layer(TraceLayer::new_for_http())
    .layer(CatchPanicLayer::new())
}
