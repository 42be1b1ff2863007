//! Subgate entitlement server.
//!
//! Verifies signed billing-platform proofs (client transaction tokens
//! and lifecycle notification webhooks) and maintains the authoritative
//! entitlement record for each subscription lineage and family member.
//!
//! Usage:
//!   subgate-server --trust-anchors anchors.pem --database subgate.db
//!
//! The trust anchors are loaded once at startup and never refreshed at
//! request time.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use subgate_entitlement::{EntitlementStore, LifecycleReconciler, MemoryStore, SqliteStore};
use subgate_proof::{ProofVerifier, TrustAnchors};
use subgate_server::{build_router, AppState, ServerConfig};
use subgate_types::Environment;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "subgate-server")]
#[command(about = "Entitlement lifecycle engine for app-store billed subscriptions")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8799")]
    port: u16,

    /// Path to the PEM bundle of pinned trust anchors
    #[arg(short = 'a', long)]
    trust_anchors: PathBuf,

    /// Path to the SQLite database; omit for an in-memory store
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Billing environment this deployment accepts (Sandbox or Production)
    #[arg(short, long, default_value = "Production")]
    environment: Environment,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let pem = std::fs::read(&args.trust_anchors).with_context(|| {
        format!(
            "failed to read trust anchors from {}",
            args.trust_anchors.display()
        )
    })?;
    let anchors = TrustAnchors::from_pem(&pem).context("failed to parse trust anchors")?;
    info!("Loaded {} pinned trust anchor(s)", anchors.len());

    let store: Arc<dyn EntitlementStore> = match &args.database {
        Some(path) => {
            info!("Entitlement store: SQLite at {}", path.display());
            Arc::new(SqliteStore::open(path).context("failed to open entitlement database")?)
        }
        None => {
            info!("Entitlement store: in-memory (records do not survive restarts)");
            Arc::new(MemoryStore::new())
        }
    };

    let config = ServerConfig {
        environment: args.environment,
        client_secret: ServerConfig::client_secret_from_env(),
    };
    if config.client_secret.is_none() {
        info!("SUBGATE_CLIENT_SECRET not set; client secret check disabled");
    }

    let state = AppState {
        verifier: Arc::new(ProofVerifier::new(anchors)),
        reconciler: Arc::new(LifecycleReconciler::new(Arc::clone(&store))),
        store,
        config: Arc::new(config),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;
    info!(
        "Subgate listening on port {} ({} mode)",
        args.port, args.environment
    );
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
