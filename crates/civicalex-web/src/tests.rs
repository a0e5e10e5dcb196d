//! End-to-end tests: the full router, middleware included, over an in-memory
//! store and a temporary upload directory.

use std::net::SocketAddr;

use axum::{
  Router,
  body::Body,
  extract::ConnectInfo,
  http::{Request, StatusCode, header},
  response::Response,
  routing::get,
};
use chrono::Utc;
use civicalex_core::{
  document::DocumentFilter,
  petition::PetitionStatus,
  store::LegalStore,
};
use civicalex_store_sqlite::SqliteStore;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
  AppState, Environment, ServerConfig,
  bridge::BridgeHandle,
  custody::{ACCESS_DENIED, Custody},
  error::{CSRF_MESSAGE, Error},
  router,
  session::COOKIE_NAME,
};

const MIB: usize = 1024 * 1024;
const BOUNDARY: &str = "civicalex-test-boundary";

struct TestApp {
  app:   Router,
  state: AppState<SqliteStore>,
  _dir:  TempDir,
}

async fn setup() -> TestApp {
  let dir = TempDir::new().unwrap();
  let config = ServerConfig {
    upload_dir: dir.path().join("uploads"),
    ..Default::default()
  };
  let store = SqliteStore::open_in_memory().await.unwrap();
  let custody = Custody::open(&config.upload_dir, config.max_upload_bytes)
    .await
    .unwrap();
  let state = AppState::new(store, config, custody, BridgeHandle::disabled());
  TestApp { app: router(state.clone()), state, _dir: dir }
}

impl TestApp {
  /// A browser with a fresh anonymous session.
  async fn client(&self) -> Client {
    let mut client = Client { app: self.app.clone(), cookie: None, csrf: String::new() };
    client.refresh_csrf().await;
    client
  }

  /// Counts sessions by purging every one that expires within two days.
  /// Destructive.
  async fn live_sessions(&self) -> u64 {
    self
      .state
      .store
      .purge_sessions(Utc::now() + chrono::Duration::days(2))
      .await
      .unwrap()
  }

  fn stored_files(&self) -> usize {
    std::fs::read_dir(self.state.custody.root()).unwrap().count()
  }
}

struct Client {
  app:    Router,
  cookie: Option<String>,
  csrf:   String,
}

async fn body_bytes(res: Response) -> Vec<u8> {
  axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(res: Response) -> Value {
  serde_json::from_slice(&body_bytes(res).await).unwrap()
}

async fn body_text(res: Response) -> String {
  String::from_utf8(body_bytes(res).await).unwrap()
}

fn form(pairs: &[(&str, &str)]) -> String {
  let mut out = url::form_urlencoded::Serializer::new(String::new());
  for (k, v) in pairs {
    out.append_pair(k, v);
  }
  out.finish()
}

fn location(res: &Response) -> &str {
  res.headers()[header::LOCATION].to_str().unwrap()
}

struct FilePart<'a> {
  name: &'a str,
  mime: &'a str,
  data: &'a [u8],
}

fn multipart(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
  let mut body = Vec::new();
  for (name, value) in fields {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
      )
      .as_bytes(),
    );
  }
  if let Some(file) = file {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"document\"; filename=\"{}\"\r\n\
         Content-Type: {}\r\n\r\n",
        file.name, file.mime
      )
      .as_bytes(),
    );
    body.extend_from_slice(file.data);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
  body
}

impl Client {
  async fn send(&mut self, mut req: Request<Body>) -> Response {
    if let Some(sid) = &self.cookie {
      req
        .headers_mut()
        .insert(header::COOKIE, format!("{COOKIE_NAME}={sid}").parse().unwrap());
    }
    let res = self.app.clone().oneshot(req).await.unwrap();
    for value in res.headers().get_all(header::SET_COOKIE) {
      let value = value.to_str().unwrap();
      if let Some(rest) = value.strip_prefix(&format!("{COOKIE_NAME}=")) {
        let sid = rest.split(';').next().unwrap_or_default();
        self.cookie = (!sid.is_empty()).then(|| sid.to_owned());
      }
    }
    res
  }

  async fn get(&mut self, path: &str) -> Response {
    self
      .send(Request::builder().uri(path).body(Body::empty()).unwrap())
      .await
  }

  async fn get_json(&mut self, path: &str) -> Value {
    let res = self.get(path).await;
    assert_eq!(res.status(), StatusCode::OK, "GET {path}");
    body_json(res).await
  }

  async fn refresh_csrf(&mut self) {
    let home = self.get_json("/").await;
    self.csrf = home["csrfToken"].as_str().unwrap().to_owned();
  }

  async fn post_form(&mut self, path: &str, pairs: &[(&str, &str)]) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri(path)
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
      .header("x-csrf-token", self.csrf.clone())
      .body(Body::from(form(pairs)))
      .unwrap();
    self.send(req).await
  }

  async fn post_multipart(&mut self, path: &str, body: Vec<u8>) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri(path)
      .header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
      )
      .header("x-csrf-token", self.csrf.clone())
      .body(Body::from(body))
      .unwrap();
    self.send(req).await
  }

  async fn register(&mut self, email: &str, password: &str) -> Response {
    let res = self
      .post_form(
        "/register",
        &[("name", "Asha Rao"), ("email", email), ("password", password)],
      )
      .await;
    self.refresh_csrf().await;
    res
  }

  async fn add_rent_dispute(&mut self) -> Value {
    let res = self
      .post_form(
        "/dashboard/add-case",
        &[
          ("title", "Rent dispute"),
          ("type", "Civil"),
          ("court", "District Court"),
          ("caseNumber", "dc/2024/1"),
        ],
      )
      .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let dashboard = self.get_json("/dashboard").await;
    dashboard["recentCases"][0].clone()
  }

  async fn add_petition(&mut self) -> Value {
    let res = self
      .post_form(
        "/dashboard/add-petition",
        &[
          ("title", "Writ against eviction"),
          ("description", "Relief sought against an unlawful eviction notice."),
          ("type", "Civil Writ"),
        ],
      )
      .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let dashboard = self.get_json("/dashboard").await;
    dashboard["recentPetitions"][0].clone()
  }

  /// Upload a small PDF linked to `case_id`; returns the new document's id.
  async fn upload_pdf(&mut self, case_id: &str) -> String {
    let body = multipart(
      &[("caseId", case_id), ("category", "Evidence")],
      Some(FilePart { name: "lease.pdf", mime: "application/pdf", data: b"%PDF-1.4 lease" }),
    );
    let res = self.post_multipart("/dashboard/upload-document", body).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let dashboard = self.get_json("/dashboard").await;
    dashboard["recentDocuments"][0]["document_id"]
      .as_str()
      .unwrap()
      .to_owned()
  }
}

// ─── Ambient behaviour ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_and_security_headers() {
  let t = setup().await;
  let mut c = t.client().await;
  let res = c.get("/health").await;
  assert_eq!(res.status(), StatusCode::OK);
  let headers = res.headers().clone();
  assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
  assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
  assert!(
    headers[header::CONTENT_SECURITY_POLICY]
      .to_str()
      .unwrap()
      .contains("frame-ancestors 'none'")
  );
  let v = body_json(res).await;
  assert_eq!(v["status"], "ok");
  assert_eq!(v["aiBridge"], false);
}

#[tokio::test]
async fn anonymous_visit_gets_a_session_cookie() {
  let t = setup().await;
  let res = t
    .app
    .clone()
    .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
    .await
    .unwrap();
  let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
  assert!(cookie.starts_with("civicalex.sid="));
  assert!(cookie.contains("HttpOnly"));
  assert!(cookie.contains("SameSite=Lax"));
  assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn health_and_api_calls_leave_no_session_behind() {
  let t = setup().await;
  for path in ["/health", "/api/cases", "/api/petitions"] {
    let res = t
      .app
      .clone()
      .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert!(res.headers().get(header::SET_COOKIE).is_none(), "{path}");
  }
  assert_eq!(t.live_sessions().await, 0);

  let mut c = Client { app: t.app.clone(), cookie: None, csrf: String::new() };
  c.refresh_csrf().await;
  assert!(c.cookie.is_some());
  c.refresh_csrf().await;
  assert_eq!(t.live_sessions().await, 1);
}

#[tokio::test]
async fn unknown_path_is_a_404_page() {
  let t = setup().await;
  let mut c = t.client().await;
  let res = c.get("/no/such/page").await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
  assert!(body_text(res).await.contains("Page not found"));
}

#[tokio::test]
async fn protected_pages_redirect_to_login() {
  let t = setup().await;
  let mut c = t.client().await;
  let case_path = format!("/cases/{}", Uuid::new_v4());
  for path in ["/dashboard", "/profile", case_path.as_str()] {
    let res = c.get(path).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER, "{path}");
    assert_eq!(location(&res), "/login");
  }
}

#[tokio::test]
async fn mutations_need_the_session_csrf_token() {
  let t = setup().await;
  let mut c = t.client().await;

  let req = Request::builder()
    .method("POST")
    .uri("/contact")
    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    .body(Body::from("name=Asha"))
    .unwrap();
  let res = c.send(req).await;
  assert_eq!(res.status(), StatusCode::FORBIDDEN);
  assert!(body_text(res).await.contains(CSRF_MESSAGE));

  // Another session's token is no good either.
  let other = t.client().await;
  let req = Request::builder()
    .method("POST")
    .uri("/contact")
    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    .header("x-csrf-token", other.csrf.clone())
    .body(Body::from("name=Asha"))
    .unwrap();
  assert_eq!(c.send(req).await.status(), StatusCode::FORBIDDEN);

  // The token may also travel in the form body.
  let body = form(&[
    ("_csrf", c.csrf.as_str()),
    ("name", "Asha"),
    ("email", "asha@example.com"),
    ("subject", "Consultation"),
    ("message", "I need help with a rent dispute."),
  ]);
  let req = Request::builder()
    .method("POST")
    .uri("/contact")
    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    .body(Body::from(body))
    .unwrap();
  let res = c.send(req).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(body_json(res).await["success"], true);
}

#[tokio::test]
async fn auth_routes_are_rate_limited_per_ip() {
  let t = setup().await;
  let addr = SocketAddr::from(([10, 0, 0, 1], 40000));
  let attempt = || {
    let mut req = Request::builder()
      .method("POST")
      .uri("/login")
      .body(Body::empty())
      .unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
  };
  for _ in 0..5 {
    let res = t.app.clone().oneshot(attempt()).await.unwrap();
    assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
  }
  let res = t.app.clone().oneshot(attempt()).await.unwrap();
  assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
  assert!(body_text(res).await.contains("Too many authentication attempts"));
}

#[tokio::test]
async fn error_detail_only_in_development() {
  async fn boom() -> Error { Error::Internal("disk on fire".into()) }

  for (environment, shown) in [(Environment::Development, true), (Environment::Production, false)] {
    let config = std::sync::Arc::new(ServerConfig { environment, ..Default::default() });
    let app = Router::new()
      .route("/", get(boom))
      .layer(axum::middleware::from_fn_with_state(config, crate::error::expose_error_detail));
    let res = app
      .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(res).await.contains("disk on fire"), shown);
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_logs_in_and_creates_a_pending_case() {
  let t = setup().await;
  let mut c = t.client().await;
  let anonymous = c.cookie.clone();

  let res = c.register("a@x.com", "secret1").await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&res), "/dashboard");
  assert_ne!(c.cookie, anonymous, "session must rotate at login");

  let case = c.add_rent_dispute().await;
  assert_eq!(case["case_number"], "DC/2024/1");
  assert_eq!(case["status"], "Pending");
  assert_eq!(case["title"], "Rent dispute");

  let dashboard = c.get_json("/dashboard").await;
  assert_eq!(dashboard["caseStats"]["total"], 1);
  assert_eq!(dashboard["caseStats"]["pending"], 1);
  assert_eq!(dashboard["user"]["email"], "a@x.com");
  assert!(dashboard["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let t = setup().await;
  let mut first = t.client().await;
  first.register("a@x.com", "secret1").await;

  let mut second = t.client().await;
  let res = second.register("A@X.com", "secret2").await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("User already exists with this email"));
}

#[tokio::test]
async fn login_logout_cycle() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;

  let res = c.post_form("/logout", &[]).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&res), "/");
  assert!(c.cookie.is_none());
  assert_eq!(c.get("/dashboard").await.status(), StatusCode::SEE_OTHER);

  c.refresh_csrf().await;
  let res = c
    .post_form("/login", &[("email", "a@x.com"), ("password", "wrong-password")])
    .await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("Invalid credentials"));

  let res = c
    .post_form("/login", &[("email", "nobody@x.com"), ("password", "secret1")])
    .await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("Invalid credentials"));

  let res = c
    .post_form("/login", &[("email", " A@x.com"), ("password", "secret1")])
    .await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&res), "/dashboard");
  c.refresh_csrf().await;
  c.get_json("/dashboard").await;
}

#[tokio::test]
async fn password_change_requires_current_password() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;

  let res = c
    .post_form(
      "/profile/change-password",
      &[("currentPassword", "nope-nope"), ("newPassword", "secret2"), ("confirmPassword", "secret2")],
    )
    .await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("Current password is incorrect"));

  let res = c
    .post_form(
      "/profile/change-password",
      &[("currentPassword", "secret1"), ("newPassword", "secret2"), ("confirmPassword", "secret2")],
    )
    .await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);

  let profile = c.get_json("/profile").await;
  assert!(!profile["user"]["password_changed_at"].is_null());
}

// ─── Cases and petitions ─────────────────────────────────────────────────────

#[tokio::test]
async fn other_users_cases_look_missing() {
  let t = setup().await;
  let mut alice = t.client().await;
  alice.register("alice@x.com", "secret1").await;
  let case = alice.add_rent_dispute().await;
  let case_id = case["case_id"].as_str().unwrap().to_owned();

  let mut bob = t.client().await;
  bob.register("bob@x.com", "secret1").await;

  let foreign = bob.get(&format!("/cases/{case_id}")).await;
  let missing = bob.get(&format!("/cases/{}", Uuid::new_v4())).await;
  assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
  assert_eq!(missing.status(), StatusCode::NOT_FOUND);
  assert_eq!(body_text(foreign).await, body_text(missing).await);

  let res = bob
    .post_form(&format!("/cases/{case_id}/change-status"), &[("status", "Closed")])
    .await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
  let res = bob.post_form(&format!("/cases/{case_id}/delete"), &[]).await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);

  let view = alice.get_json(&format!("/cases/{case_id}")).await;
  assert_eq!(view["case"]["status"], "Pending");
}

#[tokio::test]
async fn status_change_notifies_and_timeline_grows() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;
  let case_id = c.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();

  let res = c
    .post_form(&format!("/cases/{case_id}/change-status"), &[("status", "Active")])
    .await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&res), format!("/cases/{case_id}"));

  let res = c
    .post_form(
      &format!("/cases/{case_id}/add-event"),
      &[("action", "Hearing adjourned"), ("date", "2024-06-01")],
    )
    .await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);

  let view = c.get_json(&format!("/cases/{case_id}")).await;
  assert_eq!(view["case"]["status"], "Active");
  let timeline = view["case"]["timeline"].as_array().unwrap();
  assert!(timeline.iter().any(|e| e["action"] == "Hearing adjourned"));
  let notes = view["case"]["notifications"].as_array().unwrap();
  assert_eq!(notes[0]["message"], "Status changed to Active");
  assert_eq!(notes[0]["is_read"], false);

  let res = c.post_form(&format!("/cases/{case_id}/notifications/read"), &[]).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  let view = c.get_json(&format!("/cases/{case_id}")).await;
  assert_eq!(view["case"]["notifications"][0]["is_read"], true);

  let res = c
    .post_form(&format!("/cases/{case_id}/change-status"), &[("status", "Archived")])
    .await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submitting_twice_submits_once() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;
  let petition = c.add_petition().await;
  assert_eq!(petition["status"], "Draft");
  let id = petition["petition_id"].as_str().unwrap().to_owned();

  for _ in 0..2 {
    let res = c.post_form(&format!("/petitions/{id}/submit"), &[]).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/petitions/{id}"));
  }
  let view = c.get_json(&format!("/petitions/{id}")).await;
  assert_eq!(view["petition"]["status"], "Submitted");
  let filed = view["petition"]["filing_date"].clone();
  assert!(!filed.is_null());

  // Moving it on and submitting again leaves the filing date alone.
  let res = c
    .post_form(&format!("/petitions/{id}/change-status"), &[("status", "Under Review")])
    .await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  c.post_form(&format!("/petitions/{id}/submit"), &[]).await;
  let stored = t
    .state
    .store
    .get_petition(Uuid::parse_str(&id).unwrap(), user_id_of(&t, "a@x.com").await)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, PetitionStatus::UnderReview);
  assert_eq!(serde_json::to_value(stored.filing_date).unwrap(), filed);

  let mut stranger = t.client().await;
  stranger.register("s@x.com", "secret1").await;
  let res = stranger.post_form(&format!("/petitions/{id}/submit"), &[]).await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

async fn user_id_of(t: &TestApp, email: &str) -> Uuid {
  t.state
    .store
    .find_user_by_email(email.to_owned())
    .await
    .unwrap()
    .unwrap()
    .user_id
}

#[tokio::test]
async fn petition_cannot_link_a_foreign_case() {
  let t = setup().await;
  let mut alice = t.client().await;
  alice.register("alice@x.com", "secret1").await;
  let case_id = alice.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();

  let mut bob = t.client().await;
  bob.register("bob@x.com", "secret1").await;
  let res = bob
    .post_form(
      "/dashboard/add-petition",
      &[
        ("title", "Piggyback"),
        ("description", "Trying to attach to someone else's case."),
        ("type", "Civil Writ"),
        ("caseId", case_id.as_str()),
      ],
    )
    .await;
  assert_eq!(res.status(), StatusCode::FORBIDDEN);
  let bob_id = user_id_of(&t, "bob@x.com").await;
  assert!(t.state.store.list_petitions(bob_id, None).await.unwrap().is_empty());
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn oversize_upload_is_rejected_before_any_record() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;
  let case_id = c.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();

  let big = vec![b'x'; 11 * MIB];
  let body = multipart(
    &[("caseId", case_id.as_str())],
    Some(FilePart { name: "huge.pdf", mime: "application/pdf", data: &big }),
  );
  let res = c.post_multipart("/dashboard/upload-document", body).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("File exceeds the 10 MB limit"));

  let owner = user_id_of(&t, "a@x.com").await;
  let docs = t
    .state
    .store
    .find_active_documents(DocumentFilter { user_id: Some(owner), ..Default::default() })
    .await
    .unwrap();
  assert!(docs.is_empty());
  assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn unlinked_upload_is_a_validation_error() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;

  let data = vec![b'x'; 2 * MIB];
  let body = multipart(
    &[("description", "No link")],
    Some(FilePart { name: "brief.pdf", mime: "application/pdf", data: &data }),
  );
  let res = c.post_multipart("/dashboard/upload-document", body).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  assert!(body_text(res).await.contains("Please select either a case or petition"));
  assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn upload_rejects_bad_types_and_foreign_links() {
  let t = setup().await;
  let mut alice = t.client().await;
  alice.register("alice@x.com", "secret1").await;
  let case_id = alice.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();

  let body = multipart(
    &[("caseId", case_id.as_str())],
    Some(FilePart { name: "run.exe", mime: "application/octet-stream", data: b"MZ" }),
  );
  let res = alice.post_multipart("/dashboard/upload-document", body).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);

  let body = multipart(
    &[("caseId", case_id.as_str())],
    Some(FilePart { name: "photo.pdf", mime: "image/png", data: b"\x89PNG" }),
  );
  let res = alice.post_multipart("/dashboard/upload-document", body).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);

  let mut bob = t.client().await;
  bob.register("bob@x.com", "secret1").await;
  let body = multipart(
    &[("caseId", case_id.as_str())],
    Some(FilePart { name: "lease.pdf", mime: "application/pdf", data: b"%PDF-1.4" }),
  );
  let res = bob.post_multipart("/dashboard/upload-document", body).await;
  assert_eq!(res.status(), StatusCode::FORBIDDEN);
  assert!(body_text(res).await.contains("Invalid case ID or access denied"));
  assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn foreign_document_is_indistinguishable_from_missing() {
  let t = setup().await;
  let mut alice = t.client().await;
  alice.register("alice@x.com", "secret1").await;
  let case_id = alice.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();
  let doc_id = alice.upload_pdf(&case_id).await;

  let res = alice.get(&format!("/documents/{doc_id}/download")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
  assert_eq!(
    res.headers()[header::CONTENT_DISPOSITION],
    "attachment; filename=\"lease.pdf\""
  );
  assert_eq!(body_bytes(res).await, b"%PDF-1.4 lease");

  let res = alice.get(&format!("/documents/{doc_id}/view")).await;
  assert_eq!(res.headers()[header::CONTENT_DISPOSITION], "inline; filename=\"lease.pdf\"");

  let mut bob = t.client().await;
  bob.register("bob@x.com", "secret1").await;
  let foreign = bob.get(&format!("/documents/{doc_id}/download")).await;
  let missing = bob.get(&format!("/documents/{}/download", Uuid::new_v4())).await;
  assert_eq!(foreign.status(), StatusCode::FORBIDDEN);
  assert_eq!(missing.status(), StatusCode::FORBIDDEN);
  let (foreign, missing) = (body_text(foreign).await, body_text(missing).await);
  assert_eq!(foreign, missing);
  assert!(foreign.contains(ACCESS_DENIED));

  let foreign = bob.post_form(&format!("/documents/{doc_id}/delete"), &[]).await;
  let missing = bob
    .post_form(&format!("/documents/{}/delete", Uuid::new_v4()), &[])
    .await;
  assert_eq!(foreign.status(), StatusCode::FORBIDDEN);
  assert_eq!(body_text(foreign).await, body_text(missing).await);

  // Still there for its owner.
  let res = alice.get(&format!("/documents/{doc_id}/view")).await;
  assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn soft_deleted_document_is_hidden_but_kept() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;
  let case_id = c.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();
  let doc_id = c.upload_pdf(&case_id).await;
  assert_eq!(t.stored_files(), 1);

  let res = c.post_form(&format!("/documents/{doc_id}/delete"), &[]).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);

  let dashboard = c.get_json("/dashboard").await;
  assert!(dashboard["recentDocuments"].as_array().unwrap().is_empty());
  let view = c.get_json(&format!("/cases/{case_id}")).await;
  assert!(view["documents"].as_array().unwrap().is_empty());
  assert_eq!(
    c.get(&format!("/documents/{doc_id}/download")).await.status(),
    StatusCode::FORBIDDEN
  );

  let deleted = t
    .state
    .store
    .list_deleted_documents(Utc::now() + chrono::Duration::seconds(1))
    .await
    .unwrap();
  assert_eq!(deleted.len(), 1);
  assert_eq!(deleted[0].document_id.to_string(), doc_id);
  assert_eq!(t.stored_files(), 1);
}

#[tokio::test]
async fn documents_outlive_their_case() {
  let t = setup().await;
  let mut c = t.client().await;
  c.register("a@x.com", "secret1").await;
  let case_id = c.add_rent_dispute().await["case_id"].as_str().unwrap().to_owned();
  let doc_id = c.upload_pdf(&case_id).await;

  let res = c.post_form(&format!("/cases/{case_id}/delete"), &[]).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&res), "/dashboard");

  let res = c.get(&format!("/documents/{doc_id}/download")).await;
  assert_eq!(res.status(), StatusCode::OK);
}

// ─── API, search, acts, chat ─────────────────────────────────────────────────

#[tokio::test]
async fn api_requires_a_session_and_scopes_to_it() {
  let t = setup().await;
  let mut c = t.client().await;
  let res = c.get("/api/cases").await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(body_json(res).await["error"], "Authentication required");

  c.register("a@x.com", "secret1").await;
  c.add_rent_dispute().await;
  let cases = c.get_json("/api/cases").await;
  assert_eq!(cases.as_array().unwrap().len(), 1);

  let mut other = t.client().await;
  other.register("b@x.com", "secret1").await;
  let cases = other.get_json("/api/cases").await;
  assert!(cases.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn chat_without_bridge_is_unavailable() {
  let t = setup().await;
  let mut c = t.client().await;
  let req = Request::builder()
    .method("POST")
    .uri("/api/ai/chat")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(r#"{"message":"What is a writ?"}"#))
    .unwrap();
  let res = c.send(req).await;
  assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
  assert!(body_json(res).await["error"].is_string());
}

#[tokio::test]
async fn search_covers_acts_and_own_records() {
  let t = setup().await;
  let mut c = t.client().await;

  let anonymous = c.get_json("/search?q=rent").await;
  let kinds: Vec<&str> = anonymous["items"]
    .as_array()
    .unwrap()
    .iter()
    .map(|i| i["type"].as_str().unwrap())
    .collect();
  assert!(!kinds.is_empty());
  assert!(kinds.iter().all(|k| *k == "Act"));

  c.register("a@x.com", "secret1").await;
  c.add_rent_dispute().await;
  let results = c.get_json("/search?q=rent").await;
  assert_eq!(results["items"][0]["type"], "Case");
  assert_eq!(results["items"][0]["relevance"], 90);
  assert_eq!(results["items"][0]["snippet"], "Case DC/2024/1");

  let only_cases = c.get_json("/search?q=rent&type=cases").await;
  assert_eq!(only_cases["total"], 1);

  let empty = c.get_json("/search?q=").await;
  assert_eq!(empty["total"], 0);
}

#[tokio::test]
async fn act_pages() {
  let t = setup().await;
  let mut c = t.client().await;
  let list = c.get_json("/act/central").await;
  assert!(!list["acts"].as_array().unwrap().is_empty());

  let detail = c.get_json("/act/state/4").await;
  assert_eq!(detail["act"]["type"], "State Act");
  assert_eq!(detail["act"]["jurisdiction"], "Delhi");

  assert_eq!(c.get("/act/central/9999").await.status(), StatusCode::NOT_FOUND);
  assert_eq!(c.get("/act/federal/1").await.status(), StatusCode::NOT_FOUND);
  assert_eq!(c.get("/act/central/abc").await.status(), StatusCode::NOT_FOUND);
}
