//! End-to-end handshake tests: a real callback server on an ephemeral port,
//! wiremock standing in for the authorization provider, and reqwest playing
//! the browser.

use std::path::PathBuf;
use std::sync::Arc;

use birdkey_core::audit::AuditLog;
use birdkey_core::oauth1::OAuthClient;
use birdkey_core::server::{self, AppState};
use birdkey_core::store::TokenStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    base: String,
    state: AppState,
    provider: MockServer,
    http: reqwest::Client,
    audit_path: PathBuf,
    _audit_dir: tempfile::TempDir,
}

impl TestApp {
    async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base, path_and_query))
            .send()
            .await
            .expect("request to test server failed")
    }

    /// Requests the provider actually received at the access-token endpoint.
    async fn access_exchange_requests(&self) -> Vec<wiremock::Request> {
        self.provider
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/oauth/access_token")
            .collect()
    }

    async fn audit_contents(&self) -> String {
        std::fs::read_to_string(&self.audit_path).unwrap_or_default()
    }
}

async fn spawn_app() -> TestApp {
    let provider = MockServer::start().await;

    let dir = tempfile::tempdir().expect("tempdir");
    let audit_path = dir.path().join("audit.log");
    let audit = Arc::new(AuditLog::open(&audit_path).expect("audit log"));

    let oauth = Arc::new(OAuthClient::with_endpoints(
        "consumer-key",
        "consumer-secret",
        format!("{}/oauth/request_token", provider.uri()),
        format!("{}/oauth/access_token", provider.uri()),
        format!("{}/oauth/authorize", provider.uri()),
    ));

    let state = AppState::new(oauth, Arc::new(TokenStore::new()), audit);
    let app = server::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    TestApp {
        base: format!("http://{addr}"),
        state,
        provider,
        http: reqwest::Client::new(),
        audit_path,
        _audit_dir: dir,
    }
}

/// The app with the tunnel already "up": the public base URL is the local
/// listener itself, which is exactly what the provider mock redirects need.
async fn spawn_ready_app() -> TestApp {
    let app = spawn_app().await;
    let base = app.base.clone();
    app.state.set_public_base(&base).await;
    app
}

async fn mount_request_token(provider: &MockServer, token: &str, secret: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/request_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "oauth_token={token}&oauth_token_secret={secret}&oauth_callback_confirmed=true"
        )))
        .up_to_n_times(1)
        .mount(provider)
        .await;
}

async fn mount_access_token(provider: &MockServer, token: &str, secret: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "oauth_token={token}&oauth_token_secret={secret}"
        )))
        .up_to_n_times(1)
        .mount(provider)
        .await;
}

#[tokio::test]
async fn end_to_end_flow_issues_and_renders_tokens() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "xyz").await;
    mount_access_token(&app.provider, "A1", "S1").await;

    let start = app.get("/start").await;
    assert_eq!(start.status(), 200);
    let start_body = start.text().await.unwrap();
    assert!(start_body.contains("oauth_token=abc"));
    assert_eq!(app.state.store().pending_count().await, 1);

    let finish = app
        .get("/tokens?oauth_token=abc&oauth_verifier=123")
        .await;
    assert_eq!(finish.status(), 200);
    let finish_body = finish.text().await.unwrap();
    assert!(finish_body.contains("A1"));
    assert!(finish_body.contains("S1"));

    // The pending entry was consumed; the artifact was recorded
    assert_eq!(app.state.store().pending_count().await, 0);
    let issued = app.state.store().issued().await;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].token, "A1");

    // Replaying the callback must not resolve a second time
    let replay = app
        .get("/tokens?oauth_token=abc&oauth_verifier=123")
        .await;
    assert_eq!(replay.status(), 400);
    assert!(replay.text().await.unwrap().contains("not found"));
    assert_eq!(app.access_exchange_requests().await.len(), 1);
}

#[tokio::test]
async fn callback_parameters_parse_regardless_of_order() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "xyz").await;
    mount_access_token(&app.provider, "A1", "S1").await;

    app.get("/start").await;
    let finish = app
        .get("/tokens?oauth_verifier=123&oauth_token=abc")
        .await;
    assert_eq!(finish.status(), 200);
    assert!(finish.text().await.unwrap().contains("A1"));
}

#[tokio::test]
async fn two_flows_resolve_independently_without_leaking() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "xyz").await;
    mount_request_token(&app.provider, "def", "uvw").await;

    app.get("/start").await;
    app.get("/start").await;
    assert_eq!(app.state.store().pending_count().await, 2);

    // Resolve in reverse order of issuance
    mount_access_token(&app.provider, "A1", "S1").await;
    let second = app
        .get("/tokens?oauth_token=def&oauth_verifier=v2")
        .await;
    assert_eq!(second.status(), 200);
    assert!(second.text().await.unwrap().contains("A1"));

    mount_access_token(&app.provider, "A2", "S2").await;
    let first = app
        .get("/tokens?oauth_token=abc&oauth_verifier=v1")
        .await;
    assert_eq!(first.status(), 200);
    assert!(first.text().await.unwrap().contains("A2"));

    // Each exchange was signed for its own flow's request token
    let exchanges = app.access_exchange_requests().await;
    assert_eq!(exchanges.len(), 2);
    let auth_header = |r: &wiremock::Request| {
        r.headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    assert!(auth_header(&exchanges[0]).contains(r#"oauth_token="def""#));
    assert!(auth_header(&exchanges[1]).contains(r#"oauth_token="abc""#));
}

#[tokio::test]
async fn denial_removes_pending_token_and_skips_exchange() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "xyz").await;

    app.get("/start").await;
    assert_eq!(app.state.store().pending_count().await, 1);

    let denied = app.get("/tokens?denied=abc").await;
    assert_eq!(denied.status(), 400);
    assert!(denied.text().await.unwrap().contains("denied"));

    assert_eq!(app.state.store().pending_count().await, 0);
    assert!(app.access_exchange_requests().await.is_empty());
}

#[tokio::test]
async fn unknown_token_callback_yields_not_found_without_exchange() {
    let app = spawn_ready_app().await;

    let response = app
        .get("/tokens?oauth_token=never-issued&oauth_verifier=123")
        .await;
    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("not found"));
    assert!(app.access_exchange_requests().await.is_empty());
}

#[tokio::test]
async fn callback_without_verifier_leaves_flow_resumable() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "xyz").await;
    mount_access_token(&app.provider, "A1", "S1").await;

    app.get("/start").await;

    let malformed = app.get("/tokens?oauth_token=abc").await;
    assert_eq!(malformed.status(), 400);
    assert!(malformed.text().await.unwrap().contains("Missing OAuth parameters"));

    // The pending entry was not consumed by the malformed callback
    let finish = app
        .get("/tokens?oauth_token=abc&oauth_verifier=123")
        .await;
    assert_eq!(finish.status(), 200);
}

#[tokio::test]
async fn start_before_tunnel_ready_fails_gracefully() {
    let app = spawn_app().await;

    let response = app.get("/start").await;
    assert_eq!(response.status(), 503);
    assert!(response.text().await.unwrap().contains("not ready"));

    // No temporary-credential request went out with an empty callback
    assert!(app
        .provider
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}

#[tokio::test]
async fn unmatched_path_renders_404() {
    let app = spawn_ready_app().await;

    let response = app.get("/unknown").await;
    assert_eq!(response.status(), 404);
    assert!(response.text().await.unwrap().contains("Page not found"));
}

#[tokio::test]
async fn landing_page_serves_start_button() {
    let app = spawn_app().await;

    let response = app.get("/").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("/start"));
}

#[tokio::test]
async fn audit_log_names_tokens_but_never_secrets() {
    let app = spawn_ready_app().await;
    mount_request_token(&app.provider, "abc", "topsecretxyz").await;
    mount_access_token(&app.provider, "A1", "accesssecret").await;

    app.get("/start").await;
    app.get("/tokens?oauth_token=abc&oauth_verifier=123").await;

    let audit = app.audit_contents().await;
    assert!(audit.contains("request token issued: abc"));
    assert!(audit.contains("access token issued: A1"));
    assert!(!audit.contains("topsecretxyz"));
    assert!(!audit.contains("accesssecret"));
}

#[tokio::test]
async fn provider_rejection_renders_error_page() {
    let app = spawn_ready_app().await;
    Mock::given(method("POST"))
        .and(path("/oauth/request_token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid consumer key"))
        .mount(&app.provider)
        .await;

    let response = app.get("/start").await;
    assert_eq!(response.status(), 502);
    assert!(response.text().await.unwrap().contains("Authorization failed"));
    assert_eq!(app.state.store().pending_count().await, 0);
}
