//! Proxy admin server.
//!
//! Loads configuration, wires the server context, and serves the admin
//! endpoint until `/quitquitquit` or a termination signal.
//!
//! # Startup Order
//!
//! ```text
//! config ─▶ logging ─▶ stats recorder ─▶ server context ─▶ runtime watcher
//!                                                              │
//!                     address file ◀─ admin server ◀─ bind ◀───┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_admin::config::{load_config, watcher::RuntimeWatcher, ProxyConfig};
use proxy_admin::lifecycle::signals::shutdown_on_signal;
use proxy_admin::observability::{init_logging, Level};
use proxy_admin::stats::{StatsStore, StoreRecorder};
use proxy_admin::{AccessLog, AdminServer, ServerContext};

#[derive(Parser)]
#[command(name = "proxy-admin")]
#[command(about = "Administrative HTTP endpoint for the proxy", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the admin bind address from the configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.admin.bind_address = bind;
    }

    let level = Level::parse(&config.observability.log_level).unwrap_or(Level::Info);
    let log_control = init_logging(level)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "proxy-admin starting"
    );

    let stats = Arc::new(StatsStore::new());
    if let Err(e) = StoreRecorder::new(Arc::clone(&stats)).install() {
        tracing::warn!(error = %e, "Metrics recorder already installed");
    }

    let context = Arc::new(ServerContext::from_config(
        &config,
        Arc::clone(&stats),
        log_control,
    ));

    // Held for the life of the process; dropping it stops the watch.
    let _runtime_watcher = match (&config.runtime.override_path, config.runtime.watch) {
        (Some(path), true) => {
            match RuntimeWatcher::new(Path::new(path), Arc::clone(context.runtime())).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Failed to watch runtime overrides");
                    None
                }
            }
        }
        _ => None,
    };

    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    let local_addr = listener.local_addr()?;

    let server = AdminServer::new(
        AccessLog::open(&config.admin.access_log_path)?,
        local_addr,
        Arc::clone(&context),
        stats.scope("http.admin."),
    )
    .with_max_body_bytes(config.admin.max_request_body_bytes);

    if let Some(path) = &config.admin.address_path {
        server.write_address_file(Path::new(path))?;
    }

    tokio::spawn(shutdown_on_signal(context.shutdown().clone()));

    server.serve(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
