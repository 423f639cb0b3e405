// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the broker HTTP API.
//!
//! The broker router runs under `axum_test::TestServer`; the upstream
//! providers are stubbed by a real axum listener on an ephemeral port so the
//! adapters' outbound reqwest calls have somewhere to go. The spreadsheet
//! backend is an in-memory fake shared with the test for assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use sheetbroker::config::BrokerConfig;
use sheetbroker::provider::etsy::EtsyProvider;
use sheetbroker::provider::facebook::FacebookProvider;
use sheetbroker::provider::google::GoogleProvider;
use sheetbroker::provider::pkce;
use sheetbroker::sheets::{SheetInfo, SheetsBackend};
use sheetbroker::state::AppState;
use sheetbroker::transport::build_router;

// -- Fake spreadsheet backend -------------------------------------------------

#[derive(Default)]
struct FakeSheets {
    inner: Mutex<Vec<FakeSheet>>,
}

struct FakeSheet {
    sheet_id: i64,
    title: String,
    hidden: bool,
    rows: Vec<Vec<String>>,
}

impl FakeSheets {
    fn rows(&self, title: &str) -> Vec<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        inner.iter().find(|s| s.title == title).map(|s| s.rows.clone()).unwrap_or_default()
    }

    fn hidden(&self, title: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.iter().find(|s| s.title == title).map(|s| s.hidden).unwrap_or(false)
    }
}

fn sheet_of(range: &str) -> String {
    range.split('!').next().unwrap_or_default().to_owned()
}

fn row_of(range: &str) -> Option<usize> {
    let cells = range.split('!').nth(1)?;
    let first = cells.split(':').next()?;
    let digits: String = first.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[async_trait]
impl SheetsBackend for FakeSheets {
    async fn list_sheets(&self, _id: &str) -> anyhow::Result<Vec<SheetInfo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .iter()
            .map(|s| SheetInfo { sheet_id: s.sheet_id, title: s.title.clone(), hidden: s.hidden })
            .collect())
    }

    async fn add_sheet(&self, _id: &str, title: &str) -> anyhow::Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        let sheet_id = inner.len() as i64 + 100;
        inner.push(FakeSheet { sheet_id, title: title.to_owned(), hidden: false, rows: Vec::new() });
        Ok(sheet_id)
    }

    async fn read_range(&self, _id: &str, range: &str) -> anyhow::Result<Vec<Vec<String>>> {
        Ok(self.rows(&sheet_of(range)))
    }

    async fn append_row(&self, _id: &str, range: &str, row: &[String]) -> anyhow::Result<()> {
        let title = sheet_of(range);
        let mut inner = self.inner.lock().unwrap();
        let sheet = inner
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| anyhow::anyhow!("no such sheet: {title}"))?;
        sheet.rows.push(row.to_vec());
        Ok(())
    }

    async fn update_range(&self, _id: &str, range: &str, row: &[String]) -> anyhow::Result<()> {
        let title = sheet_of(range);
        let n = row_of(range).ok_or_else(|| anyhow::anyhow!("bad update range: {range}"))?;
        let mut inner = self.inner.lock().unwrap();
        let sheet = inner
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| anyhow::anyhow!("no such sheet: {title}"))?;
        while sheet.rows.len() < n {
            sheet.rows.push(Vec::new());
        }
        sheet.rows[n - 1] = row.to_vec();
        Ok(())
    }

    async fn set_hidden(&self, _id: &str, sheet_id: i64, hidden: bool) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sheet) = inner.iter_mut().find(|s| s.sheet_id == sheet_id) {
            sheet.hidden = hidden;
        }
        Ok(())
    }
}

// -- Upstream provider stub ---------------------------------------------------

#[derive(Clone, Default)]
struct StubState {
    /// Body of the last Etsy token exchange request.
    etsy_exchange_body: Arc<Mutex<Option<serde_json::Value>>>,
}

async fn google_token() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "access_token": "A",
        "refresh_token": "R",
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
}

async fn google_token_without_refresh() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "access_token": "A", "expires_in": 3599 }))
}

async fn google_userinfo() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "email": "u@x.com" }))
}

async fn etsy_token(
    State(stub): State<StubState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    *stub.etsy_exchange_body.lock().unwrap() = Some(body);
    Json(serde_json::json!({
        "access_token": "ETSY_AT",
        "refresh_token": "ETSY_RT",
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
}

async fn fb_access_token(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    if q.contains_key("fb_exchange_token") {
        Json(serde_json::json!({ "access_token": "FB_LONG", "expires_in": 5_184_000 }))
    } else {
        Json(serde_json::json!({ "access_token": "FB_SHORT", "expires_in": 5000 }))
    }
}

async fn fb_me() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": "9", "name": "Jane" }))
}

/// Serve the provider stub on an ephemeral port, returning its base URL.
async fn spawn_stub(stub: StubState) -> String {
    let router = axum::Router::new()
        .route("/google/token", post(google_token))
        .route("/google/token_nr", post(google_token_without_refresh))
        .route("/google/userinfo", get(google_userinfo))
        .route("/etsy/token", post(etsy_token))
        .route("/v19.0/oauth/access_token", get(fb_access_token))
        .route("/v19.0/me", get(fb_me))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// -- Test environment ---------------------------------------------------------

struct TestEnv {
    server: TestServer,
    sheets: Arc<FakeSheets>,
    stub: StubState,
}

fn test_config(session_ttl_secs: u64) -> BrokerConfig {
    BrokerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        session_ttl_secs,
        google_client_id: "google-client".into(),
        google_client_secret: "google-secret".into(),
        google_redirect_uri: "http://localhost:3000/callback".into(),
        etsy_keystring: "etsy-keystring".into(),
        etsy_redirect_uri: "http://localhost:3000/etsy/callback".into(),
        fb_app_id: "fb-app".into(),
        fb_app_secret: "fb-secret".into(),
        fb_redirect_uri: "http://localhost:3000/facebook/callback".into(),
        fb_api_version: "v19.0".into(),
        service_account_email: "sa@project.iam.gserviceaccount.com".into(),
        service_account_private_key: "unused-in-tests".into(),
    }
}

async fn build_env(session_ttl_secs: u64, google_token_path: &str) -> TestEnv {
    // reqwest is built with rustls-no-provider; install the ring provider
    // before any client is constructed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let stub = StubState::default();
    let base = spawn_stub(stub.clone()).await;
    let sheets = Arc::new(FakeSheets::default());
    let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();

    let google = GoogleProvider::new(
        http.clone(),
        "google-client",
        "google-secret",
        "http://localhost:3000/callback",
    )
    .with_endpoints(
        format!("{base}/google/auth"),
        format!("{base}{google_token_path}"),
        format!("{base}/google/userinfo"),
    );
    let etsy = EtsyProvider::new(http.clone(), "etsy-keystring", "http://localhost:3000/etsy/callback")
        .with_endpoints(format!("{base}/etsy/auth"), format!("{base}/etsy/token"));
    let facebook = FacebookProvider::new(
        http,
        "fb-app",
        "fb-secret",
        "http://localhost:3000/facebook/callback",
        "v19.0",
    )
    .with_endpoints(base.clone(), base.clone());

    let state = Arc::new(AppState::new(
        test_config(session_ttl_secs),
        Arc::clone(&sheets) as Arc<dyn SheetsBackend>,
        google,
        etsy,
        facebook,
        CancellationToken::new(),
    ));
    let server = TestServer::new(build_router(state)).expect("failed to create test server");
    TestEnv { server, sheets, stub }
}

async fn setup() -> TestEnv {
    build_env(600, "/google/token").await
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let q = url.split('?').nth(1)?;
    q.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_owned())
    })
}

/// Begin a flow and return (auth_url, state token).
async fn begin(env: &TestEnv, path_and_query: &str) -> (String, String) {
    let resp = env.server.get(path_and_query).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let auth_url = body["auth_url"].as_str().unwrap().to_owned();
    let state = query_param(&auth_url, "state").unwrap();
    (auth_url, state)
}

// -- Begin endpoints ----------------------------------------------------------

#[tokio::test]
async fn health_reports_pending_sessions() {
    let env = setup().await;
    begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env.server.get("/api/v1/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["pending_sessions"], 1);
}

#[tokio::test]
async fn google_begin_returns_auth_url_with_hex_state() {
    let env = setup().await;
    let (auth_url, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    assert_eq!(state.len(), 32);
    assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(auth_url.contains("access_type=offline"));
    assert!(auth_url.contains("prompt=consent"));
    assert!(auth_url.contains("response_type=code"));
}

#[tokio::test]
async fn google_begin_without_sheet_id_is_rejected() {
    let env = setup().await;
    let resp = env.server.get("/auth").await;
    resp.assert_status_bad_request();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn etsy_begin_rejects_partial_parameter_sets() {
    let env = setup().await;
    for path in [
        "/etsy/auth",
        "/etsy/auth?shopId=1",
        "/etsy/auth?shopId=1&shopName=Shop",
        "/etsy/auth?shopName=Shop&sheetId=SHEET2",
    ] {
        let resp = env.server.get(path).await;
        resp.assert_status_bad_request();
    }
}

#[tokio::test]
async fn each_begin_creates_an_independent_session() {
    let env = setup().await;
    let (_, s1) = begin(&env, "/auth?sheetId=SHEET1").await;
    let (_, s2) = begin(&env, "/auth?sheetId=SHEET1").await;
    assert_ne!(s1, s2);

    let resp = env.server.get("/api/v1/health").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["pending_sessions"], 2);
}

// -- Google flow --------------------------------------------------------------

#[tokio::test]
async fn google_flow_end_to_end() {
    let env = setup().await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env.server.get(&format!("/callback?code=the-code&state={state}")).await;
    resp.assert_status_ok();
    assert!(resp.text().contains("u@x.com"));

    let rows = env.sheets.rows("gg_refresh_token");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec!["Timestamp", "User Email", "Refresh Token"]);
    assert!(!rows[1][0].is_empty(), "timestamp cell is populated");
    assert_eq!(rows[1][1], "u@x.com");
    assert_eq!(rows[1][2], "R");
    assert!(env.sheets.hidden("gg_refresh_token"));
}

#[tokio::test]
async fn replaying_a_consumed_state_is_rejected() {
    let env = setup().await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let first = env.server.get(&format!("/callback?code=c&state={state}")).await;
    first.assert_status_ok();

    let second = env.server.get(&format!("/callback?code=c&state={state}")).await;
    second.assert_status_bad_request();

    // No second upsert happened.
    assert_eq!(env.sheets.rows("gg_refresh_token").len(), 2);
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let env = setup().await;
    let resp = env
        .server
        .get("/callback?code=c&state=00000000000000000000000000000000")
        .await;
    resp.assert_status_bad_request();
    assert!(env.sheets.rows("gg_refresh_token").is_empty());
}

#[tokio::test]
async fn callback_echoes_provider_error() {
    let env = setup().await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env
        .server
        .get(&format!("/callback?error=access_denied&state={state}"))
        .await;
    resp.assert_status_bad_request();
    assert!(resp.text().contains("access_denied"));

    // The provider error short-circuits before the session is touched.
    let retry = env.server.get(&format!("/callback?code=c&state={state}")).await;
    retry.assert_status_ok();
}

#[tokio::test]
async fn callback_without_code_is_rejected() {
    let env = setup().await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env.server.get(&format!("/callback?state={state}")).await;
    resp.assert_status_bad_request();
}

#[tokio::test]
async fn missing_refresh_token_is_a_terminal_provider_error() {
    let env = build_env(600, "/google/token_nr").await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env.server.get(&format!("/callback?code=c&state={state}")).await;
    resp.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    assert!(env.sheets.rows("gg_refresh_token").is_empty());

    // The session was consumed; the only remedy is restarting from begin.
    let retry = env.server.get(&format!("/callback?code=c&state={state}")).await;
    retry.assert_status_bad_request();
}

#[tokio::test]
async fn expired_session_is_rejected_at_callback() {
    let env = build_env(0, "/google/token").await;
    let (_, state) = begin(&env, "/auth?sheetId=SHEET1").await;

    let resp = env.server.get(&format!("/callback?code=c&state={state}")).await;
    resp.assert_status_bad_request();
    assert!(env.sheets.rows("gg_refresh_token").is_empty());
}

// -- Etsy flow ----------------------------------------------------------------

#[tokio::test]
async fn etsy_flow_end_to_end_with_pkce() {
    let env = setup().await;
    let (auth_url, state) =
        begin(&env, "/etsy/auth?shopId=42&shopName=My%20Shop&sheetId=SHEET2").await;

    let challenge = query_param(&auth_url, "code_challenge").unwrap();
    assert_eq!(query_param(&auth_url, "code_challenge_method").as_deref(), Some("S256"));

    let resp = env.server.get(&format!("/etsy/callback?code=etsy-code&state={state}")).await;
    resp.assert_status_ok();
    assert!(resp.text().contains("My Shop"));

    // The verifier sent to the token endpoint derives the advertised challenge.
    let body = env.stub.etsy_exchange_body.lock().unwrap().clone().unwrap();
    let verifier = body["code_verifier"].as_str().unwrap();
    assert_eq!(pkce::compute_code_challenge(verifier), challenge);
    assert_eq!(body["code"], "etsy-code");
    assert_eq!(body["grant_type"], "authorization_code");

    let rows = env.sheets.rows("Etsy_Tokens");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "42");
    assert_eq!(rows[1][1], "My Shop");
    assert_eq!(rows[1][2], "ETSY_AT");
    assert_eq!(rows[1][3], "ETSY_RT");
    assert_eq!(rows[1][4], "3600");
}

#[tokio::test]
async fn etsy_reauthorization_updates_the_existing_row() {
    let env = setup().await;

    for _ in 0..2 {
        let (_, state) =
            begin(&env, "/etsy/auth?shopId=42&shopName=My%20Shop&sheetId=SHEET2").await;
        let resp = env.server.get(&format!("/etsy/callback?code=c&state={state}")).await;
        resp.assert_status_ok();
    }

    let rows = env.sheets.rows("Etsy_Tokens");
    assert_eq!(rows.len(), 2, "one header plus one row for shop 42");
}

// -- Facebook flow ------------------------------------------------------------

#[tokio::test]
async fn facebook_flow_end_to_end() {
    let env = setup().await;
    let (auth_url, state) = begin(&env, "/facebook/auth?sheetId=SHEET2").await;
    assert!(auth_url.contains("/v19.0/dialog/oauth?"));

    let resp = env.server.get(&format!("/facebook/callback?code=fb-code&state={state}")).await;
    resp.assert_status_ok();
    let page = resp.text();
    assert!(page.contains("Jane"));

    let rows = env.sheets.rows("Facebook_Tokens");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "9");
    assert_eq!(rows[1][1], "Jane");
    assert_eq!(rows[1][2], "FB_LONG", "only the long-lived token is stored");
    assert_eq!(rows[1][3], "5184000");
    assert!(!rows[1][4].is_empty());
}

#[tokio::test]
async fn facebook_begin_without_sheet_id_is_rejected() {
    let env = setup().await;
    let resp = env.server.get("/facebook/auth").await;
    resp.assert_status_bad_request();
}
