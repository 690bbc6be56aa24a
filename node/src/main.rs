//! Provenance ledger node.
//!
//! Hosts a single ledger over HTTP. State lives in `<data-dir>/ledger.json`
//! and is verified by replaying its journal on startup. The first start needs
//! `--administrator`; later starts read it from the snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use provenance_common::Identity;
use provenance_node::store::default_data_dir;
use provenance_node::{router, LedgerStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "provenance-node", about = "Provenance ledger HTTP node")]
struct Cli {
    /// HTTP port to listen on.
    #[arg(long, default_value_t = 3020)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Directory holding the ledger snapshot (default: platform data dir).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Hex public key of the administrator. Required on first start.
    #[arg(long)]
    administrator: Option<Identity>,

    /// Keep the ledger in memory only (requires --administrator).
    #[arg(long)]
    in_memory: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = if cli.in_memory {
        let administrator = cli
            .administrator
            .context("--in-memory requires --administrator")?;
        tracing::warn!("running in memory; state is lost on exit");
        LedgerStore::in_memory(administrator)
    } else {
        let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
        LedgerStore::open(&data_dir, cli.administrator)
            .with_context(|| format!("failed to open ledger in {}", data_dir.display()))?
    };

    let app = router(Arc::new(store));

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "provenance node listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    tracing::info!("provenance node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
