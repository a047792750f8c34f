//! ============================================================================
//! Core Types for the Birdkey Handshake
//! ============================================================================
//! Token pairs exchanged with the authorization provider and the error
//! taxonomy every component reports through.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Temporary credentials issued at the start of a flow.
///
/// Single-use: initiates the authorization redirect and is consumed exactly
/// once when the provider redirects back with a verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

/// Durable credentials issued after the user authorized the application.
///
/// This is the artifact the whole handshake exists to produce; ownership
/// passes to whatever posts on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
}

/// Error taxonomy for the handshake.
///
/// Nothing here is retried automatically: every failure terminates the
/// current flow instance and the user restarts at the landing page.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or malformed startup configuration. Fatal; abort before
    /// binding the listener.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The tunnel has not produced a public URL yet, so there is no
    /// callback address to advertise to the provider.
    #[error("public callback URL not ready, tunnel still connecting")]
    CallbackNotReady,

    /// The authorization provider returned a non-success response.
    #[error("provider rejected the request: {0}")]
    UpstreamRejection(String),

    /// Transport failure talking to the provider or the tunnel service.
    #[error("network error: {0}")]
    Network(String),

    /// The callback named a request token this process never issued, or
    /// one that already expired or was consumed.
    #[error("request token not found: {0}")]
    NotFound(String),

    /// A request token was presented with a secret other than the one it
    /// was issued with. Signing with it would only produce a confusing
    /// provider-side rejection, so it is refused before any bytes go out.
    #[error("request token paired with a secret it was not issued with")]
    InvalidTokenPairing,
}

pub type AuthResult<T> = Result<T, AuthError>;
