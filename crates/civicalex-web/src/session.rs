//! Cookie-backed server-side sessions.
//!
//! The middleware resolves the `civicalex.sid` cookie to a stored
//! [`Session`], slides its expiry, and inserts a [`RequestContext`] plus, for
//! logged-in sessions, the caller's [`Identity`]. A visitor without a cookie
//! gets no session row until a handler asks for a [`CsrfToken`]; health
//! checks and API calls never create one. Handlers that log in or out attach
//! a [`SessionChange`] to their response; the middleware turns it into the
//! right `Set-Cookie`.

use std::sync::{Arc, OnceLock};

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, HeaderValue, header, request::Parts},
  middleware::Next,
  response::Response,
};
use chrono::{Duration, Utc};
use civicalex_core::{
  session::{Identity, Session},
  store::LegalStore,
};
use rand_core::{OsRng, RngCore};

use crate::{AppState, Environment, error::Error};

pub const COOKIE_NAME: &str = "civicalex.sid";

/// Expiry is only pushed forward once it has slipped by this much, so a
/// burst of requests costs one write.
const TOUCH_AFTER_MINUTES: i64 = 5;

/// Per-request view of the session. Built once by [`middleware`] and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RequestContext {
  /// `None` for a visitor who has no session yet.
  pub session_id: Option<String>,
  pub csrf_token: Option<String>,
  pub identity:   Option<Identity>,
  issued:         Arc<OnceLock<Session>>,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
  type Rejection = Error;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<RequestContext>()
      .cloned()
      .ok_or_else(|| Error::Internal("request context missing".to_owned()))
  }
}

/// The caller's CSRF token. A visitor without a session is given an
/// anonymous one here; this is the only place anonymous sessions are made.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<AppState<S>> for CsrfToken
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let ctx = RequestContext::from_request_parts(parts, state).await?;
    if let Some(token) = ctx.csrf_token {
      return Ok(CsrfToken(token));
    }
    if let Some(session) = ctx.issued.get() {
      return Ok(CsrfToken(session.csrf_token.clone()));
    }

    let session = Session::anonymous(
      random_token(),
      random_token(),
      Utc::now(),
      state.config.session_ttl(),
    );
    state
      .store
      .create_session(session.clone())
      .await
      .map_err(Error::store)?;
    let token = session.csrf_token.clone();
    let _ = ctx.issued.set(session);
    Ok(CsrfToken(token))
  }
}

/// Response extension telling [`middleware`] the session was replaced.
#[derive(Debug, Clone)]
pub enum SessionChange {
  /// A new session now backs this client.
  Rotated(String),
  /// The session is gone; clear the cookie.
  Ended,
}

/// 32 random bytes, hex encoded.
pub fn random_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Swap the current session, if any, for a fresh authenticated one. The
/// caller must return the id inside [`SessionChange::Rotated`].
pub async fn rotate<S>(
  state: &AppState<S>,
  ctx: &RequestContext,
  identity: Identity,
) -> Result<String, Error>
where
  S: LegalStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let previous = ctx
    .session_id
    .clone()
    .or_else(|| ctx.issued.get().map(|s| s.session_id.clone()));
  if let Some(previous) = previous {
    state.store.delete_session(previous).await.map_err(Error::store)?;
  }

  let session = Session::authenticated(
    random_token(),
    random_token(),
    identity,
    Utc::now(),
    state.config.session_ttl(),
  );
  let session_id = session.session_id.clone();
  state.store.create_session(session).await.map_err(Error::store)?;
  Ok(session_id)
}

pub async fn middleware<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error>
where
  S: LegalStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let now = Utc::now();
  let ttl = state.config.session_ttl();

  let session = match cookie_value(req.headers(), COOKIE_NAME) {
    Some(sid) => state
      .store
      .get_session(sid, now)
      .await
      .map_err(Error::store)?,
    None => None,
  };

  if let Some(session) = &session
    && session.expires_at < now + ttl - Duration::minutes(TOUCH_AFTER_MINUTES)
  {
    state
      .store
      .touch_session(session.session_id.clone(), now + ttl)
      .await
      .map_err(Error::store)?;
  }

  let identity = session.as_ref().and_then(Session::identity);
  if let Some(identity) = identity {
    req.extensions_mut().insert(identity);
  }
  let issued = Arc::new(OnceLock::new());
  req.extensions_mut().insert(RequestContext {
    session_id: session.as_ref().map(|s| s.session_id.clone()),
    csrf_token: session.as_ref().map(|s| s.csrf_token.clone()),
    identity,
    issued: issued.clone(),
  });

  let mut res = next.run(req).await;

  let secure = state.config.environment == Environment::Production;
  let max_age = ttl.num_seconds();
  let current = session
    .map(|s| s.session_id)
    .or_else(|| issued.get().map(|s| s.session_id.clone()));
  let cookie = match (res.extensions_mut().remove::<SessionChange>(), current) {
    (Some(SessionChange::Rotated(sid)), _) => set_cookie(&sid, max_age, secure),
    (Some(SessionChange::Ended), _) => set_cookie("", 0, secure),
    (None, Some(sid)) => set_cookie(&sid, max_age, secure),
    (None, None) => return Ok(res),
  };
  let cookie = HeaderValue::from_str(&cookie)
    .map_err(|e| Error::Internal(format!("bad cookie header: {e}")))?;
  res.headers_mut().append(header::SET_COOKIE, cookie);
  Ok(res)
}

fn set_cookie(value: &str, max_age: i64, secure: bool) -> String {
  let mut cookie =
    format!("{COOKIE_NAME}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
  if secure {
    cookie.push_str("; Secure");
  }
  cookie
}

/// Find `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, v)| *k == name && !v.is_empty())
    .map(|(_, v)| v.to_owned())
}
