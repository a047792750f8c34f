//! ============================================================================
//! OAuth 1.0a - Signing and the Two Token Exchanges
//! ============================================================================

pub mod sign;

mod client;

pub use client::{
    OAuthClient, TWITTER_ACCESS_TOKEN_URL, TWITTER_AUTHORIZE_URL, TWITTER_REQUEST_TOKEN_URL,
};
