//! Supervised connection to the AI assistant service.
//!
//! The service speaks newline-delimited JSON over a single TCP connection:
//! one `{"message": ...}` line out, one `{"reply": ...}` line back. A
//! background task owns the socket, serves one request at a time, and
//! reconnects with bounded exponential backoff when the connection drops.
//! Handlers only see a [`BridgeHandle`] and its health flag.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
  net::TcpStream,
  sync::{mpsc, oneshot},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
  /// `host:port` of the assistant. Unset disables the bridge.
  pub address:              Option<String>,
  pub initial_backoff_ms:   u64,
  pub max_backoff_ms:       u64,
  pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
  fn default() -> Self {
    Self {
      address:              None,
      initial_backoff_ms:   500,
      max_backoff_ms:       30_000,
      request_timeout_secs: 30,
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
  #[error("assistant is unavailable")]
  Unavailable,
  #[error("assistant did not answer in time")]
  Timeout,
  #[error("connection to assistant lost")]
  Disconnected,
  #[error("unreadable reply from assistant")]
  BadReply,
}

// ─── Backoff ──────────────────────────────────────────────────────────────────

/// Exponential reconnect delay: `initial * multiplier^(attempt - 1)`, capped
/// at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
  pub initial:    Duration,
  pub max:        Duration,
  pub multiplier: f64,
}

impl Backoff {
  pub fn from_config(config: &BridgeConfig) -> Self {
    Self {
      initial:    Duration::from_millis(config.initial_backoff_ms),
      max:        Duration::from_millis(config.max_backoff_ms),
      multiplier: 2.0,
    }
  }

  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
    Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
  }
}

// ─── Handle ───────────────────────────────────────────────────────────────────

struct BridgeRequest {
  message: String,
  reply:   oneshot::Sender<Result<String, BridgeError>>,
}

#[derive(Serialize)]
struct Outbound<'a> {
  message: &'a str,
}

#[derive(Deserialize)]
struct Inbound {
  reply: String,
}

/// Cheap to clone; all clones talk to the same supervisor.
#[derive(Clone)]
pub struct BridgeHandle {
  tx:      mpsc::Sender<BridgeRequest>,
  healthy: Arc<AtomicBool>,
  timeout: Duration,
}

impl BridgeHandle {
  /// A handle whose every request fails with [`BridgeError::Unavailable`].
  pub fn disabled() -> Self {
    let (tx, _) = mpsc::channel(1);
    Self {
      tx,
      healthy: Arc::new(AtomicBool::new(false)),
      timeout: Duration::from_secs(1),
    }
  }

  pub fn is_healthy(&self) -> bool { self.healthy.load(Ordering::Relaxed) }

  pub async fn ask(&self, message: String) -> Result<String, BridgeError> {
    if !self.is_healthy() {
      return Err(BridgeError::Unavailable);
    }
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(BridgeRequest { message, reply })
      .await
      .map_err(|_| BridgeError::Unavailable)?;
    match tokio::time::timeout(self.timeout, rx).await {
      Err(_) => Err(BridgeError::Timeout),
      Ok(Err(_)) => Err(BridgeError::Unavailable),
      Ok(Ok(result)) => result,
    }
  }
}

/// Start the supervisor task. Without an address, returns
/// [`BridgeHandle::disabled`].
pub fn spawn(config: &BridgeConfig) -> BridgeHandle {
  let Some(address) = config.address.clone() else {
    info!("AI bridge disabled: no address configured");
    return BridgeHandle::disabled();
  };
  let (tx, rx) = mpsc::channel(32);
  let healthy = Arc::new(AtomicBool::new(false));
  let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
  tokio::spawn(supervise(
    address,
    Backoff::from_config(config),
    timeout,
    rx,
    healthy.clone(),
  ));
  BridgeHandle { tx, healthy, timeout }
}

// ─── Supervisor ───────────────────────────────────────────────────────────────

enum Ended {
  /// Every handle is gone; stop supervising.
  Closed,
  /// The connection failed; reconnect.
  Dropped,
}

async fn supervise(
  address: String,
  backoff: Backoff,
  timeout: Duration,
  mut rx: mpsc::Receiver<BridgeRequest>,
  healthy: Arc<AtomicBool>,
) {
  let mut attempt = 0u32;
  loop {
    match TcpStream::connect(&address).await {
      Ok(stream) => {
        info!(%address, "AI bridge connected");
        attempt = 0;
        healthy.store(true, Ordering::Relaxed);
        let ended = serve(stream, &mut rx, timeout).await;
        healthy.store(false, Ordering::Relaxed);
        match ended {
          Ended::Closed => return,
          Ended::Dropped => warn!(%address, "AI bridge connection lost"),
        }
      }
      Err(e) => debug!(%address, error = %e, "AI bridge connect failed"),
    }

    attempt = attempt.saturating_add(1);
    let delay = backoff.delay_for_attempt(attempt);
    debug!(attempt, ?delay, "AI bridge reconnecting");

    // Requests that arrive while disconnected fail fast.
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
      tokio::select! {
        _ = &mut sleep => break,
        req = rx.recv() => match req {
          Some(req) => {
            let _ = req.reply.send(Err(BridgeError::Unavailable));
          }
          None => return,
        },
      }
    }
  }
}

async fn serve(
  stream: TcpStream,
  rx: &mut mpsc::Receiver<BridgeRequest>,
  timeout: Duration,
) -> Ended {
  let (read, mut write) = stream.into_split();
  let mut lines = BufReader::new(read).lines();

  loop {
    let req = tokio::select! {
      req = rx.recv() => match req {
        Some(req) => req,
        None => return Ended::Closed,
      },
      // Anything arriving unprompted means the peer closed or is confused.
      line = lines.next_line() => {
        if let Ok(Some(line)) = line {
          warn!(len = line.len(), "unexpected line from AI bridge");
        }
        return Ended::Dropped;
      }
    };

    let mut frame = match serde_json::to_string(&Outbound { message: &req.message }) {
      Ok(f) => f,
      Err(_) => {
        let _ = req.reply.send(Err(BridgeError::BadReply));
        continue;
      }
    };
    frame.push('\n');
    if write.write_all(frame.as_bytes()).await.is_err() {
      let _ = req.reply.send(Err(BridgeError::Disconnected));
      return Ended::Dropped;
    }

    match tokio::time::timeout(timeout, lines.next_line()).await {
      Ok(Ok(Some(line))) => {
        let result = serde_json::from_str::<Inbound>(&line)
          .map(|r| r.reply)
          .map_err(|_| BridgeError::BadReply);
        let _ = req.reply.send(result);
      }
      Ok(Ok(None)) | Ok(Err(_)) => {
        let _ = req.reply.send(Err(BridgeError::Disconnected));
        return Ended::Dropped;
      }
      Err(_) => {
        // A late reply would be read as the answer to the next request.
        let _ = req.reply.send(Err(BridgeError::Timeout));
        return Ended::Dropped;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::net::TcpListener;

  fn config(address: String) -> BridgeConfig {
    BridgeConfig {
      address:              Some(address),
      initial_backoff_ms:   10,
      max_backoff_ms:       50,
      request_timeout_secs: 2,
    }
  }

  async fn wait_healthy(handle: &BridgeHandle) {
    for _ in 0..200 {
      if handle.is_healthy() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("bridge never became healthy");
  }

  /// Echo server: answers each message with `echo: <message>`.
  async fn echo_once(listener: &TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
      let v: serde_json::Value = serde_json::from_str(&line).unwrap();
      let reply = serde_json::json!({ "reply": format!("echo: {}", v["message"].as_str().unwrap()) });
      write.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
    }
  }

  #[test]
  fn backoff_doubles_and_caps() {
    let backoff = Backoff::from_config(&BridgeConfig::default());
    assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(500));
    assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(1));
    assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(2));
    assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(4));
    assert_eq!(backoff.delay_for_attempt(20), Duration::from_secs(30));
    assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_secs(30));
  }

  #[tokio::test]
  async fn disabled_bridge_is_unavailable() {
    let handle = spawn(&BridgeConfig::default());
    assert!(!handle.is_healthy());
    assert_eq!(handle.ask("hi".into()).await, Err(BridgeError::Unavailable));
  }

  #[tokio::test]
  async fn relays_messages() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let handle = spawn(&config(listener.local_addr().unwrap().to_string()));
    tokio::spawn(async move { echo_once(&listener).await });

    wait_healthy(&handle).await;
    assert_eq!(handle.ask("hello".into()).await.unwrap(), "echo: hello");
    assert_eq!(handle.ask("again".into()).await.unwrap(), "echo: again");
  }

  #[tokio::test]
  async fn reconnects_after_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let handle = spawn(&config(listener.local_addr().unwrap().to_string()));

    // First connection: accept and hang up immediately.
    let (stream, _) = listener.accept().await.unwrap();
    drop(stream);

    tokio::spawn(async move { echo_once(&listener).await });
    // The supervisor notices the drop, backs off and reconnects.
    let mut answer = Err(BridgeError::Unavailable);
    for _ in 0..100 {
      if handle.is_healthy() {
        answer = handle.ask("back".into()).await;
        if answer.is_ok() {
          break;
        }
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(answer.unwrap(), "echo: back");
  }

  #[tokio::test]
  async fn unreachable_service_stays_unhealthy() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let handle = spawn(&config(address));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_healthy());
    assert_eq!(handle.ask("hi".into()).await, Err(BridgeError::Unavailable));
  }
}
