// ============================================================================
// birdkey — three-legged OAuth handshake server
// ============================================================================
// Usage:
//   birdkey serve [--port 8080] [--public-url URL] [--audit-log PATH]
//   birdkey check
//
// `serve` binds the callback listener, establishes ngrok ingress (unless a
// public URL is configured), and walks browser sessions through the
// request-token / authorize / access-token handshake.
// ============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use birdkey_core::server::{self, AppState};
use birdkey_core::store::SWEEP_INTERVAL;
use birdkey_core::{
    AuditLog, Config, NgrokTunnel, OAuthClient, StaticTunnel, TokenStore, Tunnel,
};

/// Obtain Twitter access tokens through a tunnel-exposed OAuth 1.0a handshake
#[derive(Parser)]
#[command(name = "birdkey", version, about = "Three-legged OAuth token handoff server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the callback server and tunnel
    Serve {
        /// Local port for the callback listener (overrides BIRDKEY_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Publicly reachable base URL; skips the ngrok tunnel
        /// (overrides BIRDKEY_PUBLIC_URL)
        #[arg(long)]
        public_url: Option<String>,

        /// Audit log path (overrides BIRDKEY_AUDIT_LOG)
        #[arg(long)]
        audit_log: Option<String>,
    },

    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: could not load .env file: {e}");
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("birdkey=info".parse()?)
                .add_directive("birdkey_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            port,
            public_url,
            audit_log,
        } => serve(port, public_url, audit_log).await,
        Commands::Check => check(),
    }
}

async fn serve(
    port: Option<u16>,
    public_url: Option<String>,
    audit_log: Option<String>,
) -> Result<()> {
    let mut config = Config::from_env().context("configuration rejected")?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(url) = public_url {
        config.public_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(path) = audit_log {
        config.audit_log = path.into();
    }

    let audit = Arc::new(AuditLog::open(&config.audit_log)?);
    let oauth = Arc::new(OAuthClient::new(
        config.consumer_key.clone(),
        config.consumer_secret.clone(),
    ));
    let store = Arc::new(TokenStore::new());
    let state = AppState::new(oauth, Arc::clone(&store), Arc::clone(&audit));

    let app = server::router(state.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Callback server listening on http://{}", addr);
    audit.record(format!("callback server listening on {addr}"));

    store.start_sweeper(SWEEP_INTERVAL);

    // Ingress comes up after the listener, like the flow expects: until the
    // public URL lands, /start answers retry-later instead of advertising an
    // empty callback.
    let tunnel: Arc<dyn Tunnel> = match &config.public_url {
        Some(url) => {
            info!("Using configured public URL, no tunnel: {}", url);
            Arc::new(StaticTunnel::new(url.clone()))
        }
        None => Arc::new(NgrokTunnel),
    };
    {
        let state = state.clone();
        let audit = Arc::clone(&audit);
        let local_port = config.port;
        tokio::spawn(async move {
            match tunnel.connect(local_port).await {
                Ok(base) => state.set_public_base(&base).await,
                Err(e) => {
                    error!("Error establishing tunnel: {}", e);
                    audit.record(format!("tunnel failed: {e}"));
                }
            }
        });
    }

    axum::serve(listener, app)
        .await
        .context("callback server failed")?;
    Ok(())
}

fn check() -> Result<()> {
    let config = Config::from_env().context("configuration rejected")?;

    println!("Configuration OK");
    println!("  port:       {}", config.port);
    println!("  audit log:  {}", config.audit_log.display());
    println!(
        "  public URL: {}",
        config.public_url.as_deref().unwrap_or("(ngrok tunnel)")
    );
    Ok(())
}
