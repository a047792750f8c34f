//! ============================================================================
//! OAuth 1.0a Client - Request-Token and Access-Token Exchanges
//! ============================================================================
//! The two signed POSTs of the three-legged handshake. Endpoint URLs default
//! to Twitter but are injectable so tests can stand up a mock provider.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info};

use crate::oauth1::sign;
use crate::types::{AccessToken, AuthError, AuthResult, RequestToken};

/// Twitter OAuth 1.0a endpoints
pub const TWITTER_REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";
pub const TWITTER_ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";
pub const TWITTER_AUTHORIZE_URL: &str = "https://api.twitter.com/oauth/authorize";

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// OAuth 1.0a client for one consumer-key registration.
///
/// Remembers which (request token, secret) pairs it issued this process, so
/// an exchange presenting a token with the wrong secret is refused outright
/// instead of producing an opaque provider-side signature rejection.
pub struct OAuthClient {
    client: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    request_token_url: String,
    access_token_url: String,
    authorize_url: String,
    issued_pairs: Mutex<HashMap<String, String>>,
}

impl OAuthClient {
    /// Client against the Twitter endpoints.
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self::with_endpoints(
            consumer_key,
            consumer_secret,
            TWITTER_REQUEST_TOKEN_URL,
            TWITTER_ACCESS_TOKEN_URL,
            TWITTER_AUTHORIZE_URL,
        )
    }

    /// Client against arbitrary endpoints (tests point this at a mock).
    pub fn with_endpoints(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        request_token_url: impl Into<String>,
        access_token_url: impl Into<String>,
        authorize_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            request_token_url: request_token_url.into(),
            access_token_url: access_token_url.into(),
            authorize_url: authorize_url.into(),
            issued_pairs: Mutex::new(HashMap::new()),
        }
    }

    /// First leg: obtain temporary credentials, advertising `callback_url`
    /// as where the provider should send the user afterwards.
    pub async fn request_temporary_credentials(
        &self,
        callback_url: &str,
    ) -> AuthResult<RequestToken> {
        info!("Requesting temporary credentials from {}", self.request_token_url);

        let mut params = self.base_protocol_params();
        params.push(("oauth_callback".to_string(), callback_url.to_string()));

        let body = self
            .signed_post(&self.request_token_url, params, "")
            .await?;
        let fields = parse_form_body(&body);

        let confirmed = fields
            .get("oauth_callback_confirmed")
            .map(String::as_str)
            .unwrap_or_default();
        if confirmed != "true" {
            return Err(AuthError::UpstreamRejection(
                "provider did not confirm the callback URL".to_string(),
            ));
        }

        let token = required_field(&fields, "oauth_token")?;
        let secret = required_field(&fields, "oauth_token_secret")?;

        self.issued_pairs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.clone(), secret.clone());

        debug!("Temporary credentials issued for token {}", token);
        Ok(RequestToken { token, secret })
    }

    /// Second leg: trade consumed temporary credentials plus the user's
    /// verifier for durable access credentials.
    ///
    /// The (token, secret) pair must be exactly what the first leg returned;
    /// anything else fails before a single byte is sent.
    pub async fn exchange_for_access_token(
        &self,
        request_token: &str,
        request_secret: &str,
        verifier: &str,
    ) -> AuthResult<AccessToken> {
        self.check_pairing(request_token, request_secret)?;

        info!("Exchanging request token {} for access credentials", request_token);

        let mut params = self.base_protocol_params();
        params.push(("oauth_token".to_string(), request_token.to_string()));
        params.push(("oauth_verifier".to_string(), verifier.to_string()));

        let body = self
            .signed_post(&self.access_token_url, params, request_secret)
            .await?;
        let fields = parse_form_body(&body);

        let token = required_field(&fields, "oauth_token")?;
        let secret = required_field(&fields, "oauth_token_secret")?;

        self.issued_pairs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(request_token);

        info!("Access credentials issued for token {}", token);
        Ok(AccessToken { token, secret })
    }

    /// Where to send the user to approve the request token.
    pub fn authorize_url(&self, request_token: &str) -> String {
        format!(
            "{}?oauth_token={}",
            self.authorize_url,
            urlencoding::encode(request_token)
        )
    }

    fn check_pairing(&self, request_token: &str, request_secret: &str) -> AuthResult<()> {
        let issued = self
            .issued_pairs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match issued.get(request_token) {
            Some(secret) if secret == request_secret => Ok(()),
            _ => Err(AuthError::InvalidTokenPairing),
        }
    }

    fn base_protocol_params(&self) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), sign::nonce()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), sign::timestamp()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ]
    }

    /// Sign and send one protocol POST, returning the response body.
    async fn signed_post(
        &self,
        url: &str,
        mut params: Vec<(String, String)>,
        token_secret: &str,
    ) -> AuthResult<String> {
        let base_string = sign::signature_base_string("POST", url, &params);
        let signature = sign::sign(&base_string, &self.consumer_secret, token_secret)?;
        params.push(("oauth_signature".to_string(), signature));

        let response = self
            .client
            .post(url)
            .header("Authorization", sign::authorization_header(&params))
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(format!("reading response from {url} failed: {e}")))?;

        if !status.is_success() {
            return Err(AuthError::UpstreamRejection(format!("{status}: {body}")));
        }

        Ok(body)
    }
}

fn parse_form_body(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}

fn required_field(fields: &HashMap<String, String>, name: &str) -> AuthResult<String> {
    fields
        .get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| {
            AuthError::UpstreamRejection(format!("provider response is missing {name}"))
        })
}
