//! ============================================================================
//! Tunnel - Public Ingress for the Callback Route
//! ============================================================================
//! The authorization provider must be able to reach the locally bound
//! callback server, so the listener is exposed through ngrok. The seam is a
//! trait: deployments that are already publicly reachable (and tests)
//! substitute a static base URL instead.
//! ============================================================================

use async_trait::async_trait;
use ngrok::tunnel::EndpointInfo;
use tracing::{error, info};
use url::Url;

use crate::types::{AuthError, AuthResult};

/// Maps a locally bound port to a publicly reachable base URL.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Establish the tunnel and return the public base URL (no trailing
    /// slash). The tunnel stays up for the life of the process.
    async fn connect(&self, local_port: u16) -> AuthResult<String>;
}

/// ngrok-backed tunnel. Reads its authtoken from `NGROK_AUTHTOKEN`.
pub struct NgrokTunnel;

#[async_trait]
impl Tunnel for NgrokTunnel {
    async fn connect(&self, local_port: u16) -> AuthResult<String> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        // The forwarder closes the tunnel when dropped, so the task that
        // creates it parks with it for the life of the process.
        tokio::spawn(async move {
            let connected = async {
                use ngrok::prelude::*;

                let session = ngrok::Session::builder()
                    .authtoken_from_env()
                    .connect()
                    .await?;
                let forward_to = Url::parse(&format!("http://localhost:{local_port}"))?;
                let forwarder = session.http_endpoint().listen_and_forward(forward_to).await?;
                Ok::<_, anyhow::Error>(forwarder)
            }
            .await;

            match connected {
                Ok(forwarder) => {
                    let url = forwarder.url().to_string();
                    let url = url.trim_end_matches('/').to_string();
                    info!("Ingress established at: {}", url);
                    let _ = tx.send(Ok(url));
                    let _keepalive = forwarder;
                    std::future::pending::<()>().await;
                }
                Err(e) => {
                    error!("Error establishing ngrok tunnel: {}", e);
                    let _ = tx.send(Err(AuthError::Network(format!(
                        "ngrok tunnel failed: {e}"
                    ))));
                }
            }
        });

        rx.await
            .map_err(|_| AuthError::Network("tunnel task exited before connecting".to_string()))?
    }
}

/// No tunnel at all: the process is already reachable at a fixed base URL.
pub struct StaticTunnel {
    base_url: String,
}

impl StaticTunnel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Tunnel for StaticTunnel {
    async fn connect(&self, _local_port: u16) -> AuthResult<String> {
        Ok(self.base_url.clone())
    }
}
