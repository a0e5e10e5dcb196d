//! Per-IP sliding-window rate limiting.
//!
//! Four independent buckets share one table. The general bucket only counts
//! responses that failed (status >= 400); the others count every request to
//! their routes.

use std::{
  collections::{HashMap, VecDeque},
  net::{IpAddr, SocketAddr},
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  Json,
  extract::{ConnectInfo, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Error;

pub const WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
  Auth,
  Api,
  Upload,
  General,
}

impl Bucket {
  pub fn limit(self) -> usize {
    match self {
      Bucket::Auth => 5,
      Bucket::Api => 50,
      Bucket::Upload => 10,
      Bucket::General => 100,
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      Bucket::Auth => "Too many authentication attempts. Please try again later.",
      Bucket::Upload => "Too many uploads. Please try again later.",
      Bucket::Api | Bucket::General => {
        "Too many requests from this IP, please try again later."
      }
    }
  }

  /// The route-specific bucket for `path`, if any.
  pub fn for_path(path: &str) -> Option<Bucket> {
    match path {
      "/login" | "/register" => Some(Bucket::Auth),
      "/dashboard/upload-document" => Some(Bucket::Upload),
      p if p.starts_with("/api/") => Some(Bucket::Api),
      _ => None,
    }
  }
}

#[derive(Clone)]
pub struct RateLimiter {
  hits:   Arc<Mutex<HashMap<(Bucket, IpAddr), VecDeque<Instant>>>>,
  window: Duration,
}

impl RateLimiter {
  pub fn new(window: Duration) -> Self {
    Self {
      hits: Arc::new(Mutex::new(HashMap::new())),
      window,
    }
  }

  /// Record a hit and report whether it is within the limit. A rejected hit
  /// is not recorded.
  pub async fn check(&self, bucket: Bucket, ip: IpAddr) -> bool {
    let mut hits = self.hits.lock().await;
    let window = hits.entry((bucket, ip)).or_default();
    prune(window, self.window, Instant::now());
    if window.len() >= bucket.limit() {
      return false;
    }
    window.push_back(Instant::now());
    true
  }

  /// Whether `ip` has used up `bucket`, without recording anything.
  pub async fn is_exhausted(&self, bucket: Bucket, ip: IpAddr) -> bool {
    let mut hits = self.hits.lock().await;
    let Some(window) = hits.get_mut(&(bucket, ip)) else {
      return false;
    };
    prune(window, self.window, Instant::now());
    window.len() >= bucket.limit()
  }

  pub async fn record(&self, bucket: Bucket, ip: IpAddr) {
    let mut hits = self.hits.lock().await;
    hits.entry((bucket, ip)).or_default().push_back(Instant::now());
  }

  /// Drop expired hits and forget clients with none left.
  pub async fn purge_stale(&self) {
    let mut hits = self.hits.lock().await;
    let now = Instant::now();
    hits.retain(|_, window| {
      prune(window, self.window, now);
      !window.is_empty()
    });
  }
}

impl Default for RateLimiter {
  fn default() -> Self { Self::new(WINDOW) }
}

fn prune(window: &mut VecDeque<Instant>, span: Duration, now: Instant) {
  while window
    .front()
    .is_some_and(|t| now.duration_since(*t) >= span)
  {
    window.pop_front();
  }
}

fn too_many(bucket: Bucket, path: &str) -> Response {
  if path.starts_with("/api/") {
    (
      StatusCode::TOO_MANY_REQUESTS,
      Json(json!({ "error": bucket.message() })),
    )
      .into_response()
  } else {
    Error::RateLimited(bucket.message()).into_response()
  }
}

/// Clients without a known socket address are not limited.
pub async fn middleware(
  State(limiter): State<RateLimiter>,
  req: Request,
  next: Next,
) -> Response {
  let Some(ip) = req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip())
  else {
    return next.run(req).await;
  };
  let path = req.uri().path().to_owned();

  if limiter.is_exhausted(Bucket::General, ip).await {
    warn!(ip = %ip, "general rate limit exceeded");
    return too_many(Bucket::General, &path);
  }
  if let Some(bucket) = Bucket::for_path(&path)
    && !limiter.check(bucket, ip).await
  {
    warn!(ip = %ip, ?bucket, "rate limit exceeded");
    return too_many(bucket, &path);
  }

  let res = next.run(req).await;
  if res.status().is_client_error() || res.status().is_server_error() {
    limiter.record(Bucket::General, ip).await;
  }
  res
}
