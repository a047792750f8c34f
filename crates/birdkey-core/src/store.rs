//! ============================================================================
//! Token Store - Redirect-Boundary Correlation
//! ============================================================================
//! The provider redirect cannot carry the request-token secret, so it is
//! remembered here, keyed by the token, between `/start` and the callback.
//! Entries are single-use and expire after a bounded window so abandoned
//! flows cannot grow memory without bound.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{AccessToken, RequestToken};

/// How long an unconsumed request token stays resolvable
pub const REQUEST_TOKEN_TTL: Duration = Duration::from_secs(600);

/// How often the background sweep runs
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct PendingEntry {
    secret: String,
    issued_at: Instant,
}

/// Shared in-memory store correlating each flow's secrets across the
/// external redirect hop.
///
/// Keyed purely by provider-issued token strings, so concurrent flows from
/// different browser sessions cannot collide. Locks are held only for the
/// map mutation itself, never across a network call.
pub struct TokenStore {
    pending: RwLock<HashMap<String, PendingEntry>>,
    issued: RwLock<Vec<AccessToken>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::with_ttl(REQUEST_TOKEN_TTL)
    }

    /// Store with a custom pending-entry lifetime (tests shrink it).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            issued: RwLock::new(Vec::new()),
            ttl,
        }
    }

    /// Remember the secret for a freshly issued request token.
    /// Unconditional insert: the provider never re-issues a token string.
    pub async fn put(&self, token: &RequestToken) {
        let mut pending = self.pending.write().await;
        pending.insert(
            token.token.clone(),
            PendingEntry {
                secret: token.secret.clone(),
                issued_at: Instant::now(),
            },
        );
    }

    /// Look up and remove in one step, enforcing single use per flow.
    /// Expired entries are treated as absent.
    pub async fn consume(&self, token: &str) -> Option<RequestToken> {
        let mut pending = self.pending.write().await;
        let entry = pending.remove(token)?;
        if entry.issued_at.elapsed() >= self.ttl {
            debug!("request token {} expired before the callback arrived", token);
            return None;
        }
        Some(RequestToken {
            token: token.to_string(),
            secret: entry.secret,
        })
    }

    /// Best-effort deletion, used when the user denies authorization.
    pub async fn remove(&self, token: &str) -> bool {
        self.pending.write().await.remove(token).is_some()
    }

    /// Number of flows currently awaiting their callback.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Record a completed flow's durable artifact.
    pub async fn record_issued(&self, token: AccessToken) {
        self.issued.write().await.push(token);
    }

    /// Access tokens issued during this process lifetime.
    pub async fn issued(&self) -> Vec<AccessToken> {
        self.issued.read().await.clone()
    }

    /// Drop pending entries past the TTL. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, entry| entry.issued_at.elapsed() < self.ttl);
        before - pending.len()
    }

    /// Periodic sweep so tokens from abandoned flows do not linger until
    /// someone happens to call `consume`.
    pub fn start_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let purged = store.purge_expired().await;
                if purged > 0 {
                    debug!("swept {} expired request token(s)", purged);
                }
            }
        })
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
