//! ============================================================================
//! Callback HTTP Server - The Three Routes of the Handshake
//! ============================================================================
//! Structured axum routing over the flow's state machine:
//! - GET /        landing page
//! - GET /start   first leg: request temporary credentials, render redirect
//! - GET /tokens  callback: verifier exchange, denial, or not-found
//! Anything else is a 404. Each request runs on its own task; the token
//! store lock is never held across a provider call.
//! ============================================================================

pub mod pages;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::audit::{redact, AuditLog};
use crate::oauth1::OAuthClient;
use crate::store::TokenStore;
use crate::types::AuthError;

/// Path the provider redirects back to; appended to the tunnel's base URL
/// to form the advertised callback.
pub const CALLBACK_PATH: &str = "/tokens";

/// Query parameters the provider may send to the callback route.
/// Extraction is structured, so parameter ordering never matters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub denied: Option<String>,
}

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    oauth: Arc<OAuthClient>,
    store: Arc<TokenStore>,
    audit: Arc<AuditLog>,
    callback_base: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(oauth: Arc<OAuthClient>, store: Arc<TokenStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            oauth,
            store,
            audit,
            callback_base: Arc::new(RwLock::new(None)),
        }
    }

    /// Publish the tunnel's public base URL once it is known. `/start`
    /// fails gracefully until this happens.
    pub async fn set_public_base(&self, base_url: &str) {
        let base = base_url.trim_end_matches('/').to_string();
        info!("Advertising callback URL {}{}", base, CALLBACK_PATH);
        self.audit
            .record(format!("public ingress established at {base}"));
        *self.callback_base.write().await = Some(base);
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// The exact callback URL advertised to the provider, if ready.
    async fn callback_url(&self) -> Option<String> {
        self.callback_base
            .read()
            .await
            .as_ref()
            .map(|base| format!("{base}{CALLBACK_PATH}"))
    }
}

/// Build the route table over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/start", get(start_flow))
        .route(CALLBACK_PATH, get(finish_flow))
        .fallback(not_found)
        .with_state(state)
}

async fn landing() -> Html<String> {
    Html(pages::landing())
}

/// First leg. Requires the tunnel URL; on success the request token secret
/// is stored keyed by its token, and the user gets the authorization link.
async fn start_flow(State(state): State<AppState>) -> (StatusCode, Html<String>) {
    let Some(callback_url) = state.callback_url().await else {
        warn!("/start hit before the tunnel produced a public URL");
        state
            .audit
            .record(format!("start rejected: {}", AuthError::CallbackNotReady));
        return (StatusCode::SERVICE_UNAVAILABLE, Html(pages::not_ready()));
    };

    match state.oauth.request_temporary_credentials(&callback_url).await {
        Ok(request_token) => {
            state.store.put(&request_token).await;
            state.audit.record(format!(
                "request token issued: {} (secret {})",
                request_token.token,
                redact(&request_token.secret)
            ));
            let auth_url = state.oauth.authorize_url(&request_token.token);
            (StatusCode::OK, Html(pages::authorize_redirect(&auth_url)))
        }
        Err(e) => {
            error!("Error generating request token: {}", e);
            state.audit.record(format!("request token failed: {e}"));
            failure_response(&e)
        }
    }
}

/// Callback leg. Denial removes the pending entry; otherwise the stored
/// secret is consumed (single use) and exchanged for access credentials.
async fn finish_flow(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> (StatusCode, Html<String>) {
    if let Some(denied_token) = params.denied {
        state.store.remove(&denied_token).await;
        state.audit.record(format!(
            "authorization denied by user for request token {denied_token}"
        ));
        return (StatusCode::BAD_REQUEST, Html(pages::denied()));
    }

    let (Some(token), Some(verifier)) = (params.oauth_token, params.oauth_verifier) else {
        state
            .audit
            .record("callback missing oauth_token or oauth_verifier");
        return (StatusCode::BAD_REQUEST, Html(pages::missing_params()));
    };

    let Some(pending) = state.store.consume(&token).await else {
        let err = AuthError::NotFound(token);
        warn!("{}", err);
        state.audit.record(format!("callback failed: {err}"));
        return (StatusCode::BAD_REQUEST, Html(pages::token_not_found()));
    };

    match state
        .oauth
        .exchange_for_access_token(&pending.token, &pending.secret, &verifier)
        .await
    {
        Ok(access) => {
            state.audit.record(format!(
                "access token issued: {} (secret {})",
                access.token,
                redact(&access.secret)
            ));
            state.store.record_issued(access.clone()).await;
            (StatusCode::OK, Html(pages::tokens_issued(&access)))
        }
        Err(e) => {
            error!("Error obtaining access tokens: {}", e);
            state
                .audit
                .record(format!("access token exchange failed for {token}: {e}"));
            failure_response(&e)
        }
    }
}

async fn not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(pages::not_found()))
}

/// Map a flow failure to a status code and an error page. Nothing here is
/// retried; the user restarts from the landing page.
fn failure_response(err: &AuthError) -> (StatusCode, Html<String>) {
    let status = match err {
        AuthError::CallbackNotReady => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::UpstreamRejection(_) | AuthError::Network(_) => StatusCode::BAD_GATEWAY,
        AuthError::NotFound(_) | AuthError::InvalidTokenPairing => StatusCode::BAD_REQUEST,
        AuthError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Html(pages::flow_failed(&err.to_string())))
}
