//! msgate worker daemon
//!
//! One `msgated` process is one gateway worker. It:
//! - Serves the send API over HTTP
//! - Admits requests through the shared counter store and the local limiter
//! - Paces queued messages out to tenant push endpoints
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Everything is built from the YAML configuration in [`Daemon::new`]. The
//! HTTP server and the window monitor then run side by side until a shared
//! `CancellationToken` is cancelled by the signal handler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use msgate_cache::{DatabasePool, InMemoryCounterStore, SqliteCounterStore};
use msgate_core::config::{Config, LoggingConfig, StoreBackend, StoreConfig};
use msgate_core::ports::{ICounterStore, IDispatchHandler, ITenantConfigResolver};
use msgate_core::tenant::StaticTenantResolver;
use msgate_http::{Gateway, HttpServer};
use msgate_limiter::{ConcurrencyLimiterRegistry, DistributedAdmissionGate};
use msgate_push::{PushClient, PushDispatchHandler};
use msgate_window::{DeliveryWindowManager, WindowMonitor};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "msgated", version, about = "Multi-tenant messaging gateway worker")]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/msgate/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Zero all shared admission counters before serving (SQLite store only)
    #[arg(long)]
    reset_counters: bool,
}

/// Loads the configuration file
///
/// An explicitly requested file must exist and parse. The default location
/// falls back to built-in defaults.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::load_or_default(&Config::default_path())),
    }
}

/// Installs the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    let installed = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

// ============================================================================
// Wiring
// ============================================================================

/// Opens the shared counter store selected by `store.backend`
async fn build_store(config: &StoreConfig, reset: bool) -> Result<Arc<dyn ICounterStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let db = DatabasePool::new(&config.path).await.with_context(|| {
                format!("Failed to open counter database {}", config.path.display())
            })?;
            let store = SqliteCounterStore::new(db.pool().clone());
            if reset {
                let reset = store.reset_all().await?;
                info!(counters = reset, "Reset shared admission counters");
            }
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory counter store; admission counts are not shared between workers");
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
    }
}

/// A fully wired gateway worker
struct Daemon {
    server: HttpServer,
    monitor: WindowMonitor,
    shutdown: CancellationToken,
}

impl Daemon {
    /// Builds every component from `config` and binds the listening socket
    async fn new(config: &Config, reset_counters: bool, shutdown: CancellationToken) -> Result<Self> {
        let store = build_store(&config.store, reset_counters).await?;
        let tenants: Arc<dyn ITenantConfigResolver> =
            Arc::new(StaticTenantResolver::from_config(config));

        let gate = DistributedAdmissionGate::new(
            store,
            Arc::clone(&tenants),
            config.limits.counter_namespace.clone(),
        );
        let registry = ConcurrencyLimiterRegistry::new(config.limits.worker_concurrency_limit);
        let windows = Arc::new(DeliveryWindowManager::from_config(&config.window));

        let client = PushClient::from_config(&config.push)?;
        let handler: Arc<dyn IDispatchHandler> = Arc::new(PushDispatchHandler::new(
            client,
            tenants,
            Arc::clone(&windows),
        ));
        let monitor = WindowMonitor::from_config(Arc::clone(&windows), handler, &config.window);

        let gateway = Arc::new(Gateway::new(gate, registry, windows, &config.server));
        let server = HttpServer::bind(gateway, &config.server.bind)
            .await
            .with_context(|| format!("Failed to bind {}", config.server.bind))?;

        info!(
            addr = %server.local_addr(),
            concurrency_limit = config.limits.concurrency_limit,
            worker_concurrency_limit = config.limits.worker_concurrency_limit,
            tenants = config.tenants.len(),
            "Gateway worker initialized"
        );

        Ok(Self {
            server,
            monitor,
            shutdown,
        })
    }

    /// Serves until the shutdown token is cancelled
    async fn run(self) -> Result<()> {
        let monitor = tokio::spawn(self.monitor.run(self.shutdown.clone()));

        let result = self.server.run(self.shutdown.clone()).await;

        // The server may have stopped on its own; take the monitor down too
        self.shutdown.cancel();
        if let Err(e) = monitor.await {
            error!(error = %e, "Window monitor task failed");
        }

        result
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let errors = config.validate();
    if cli.check_config {
        if errors.is_empty() {
            println!("Configuration OK");
            return Ok(());
        }
        for e in &errors {
            eprintln!("{e}");
        }
        anyhow::bail!("{} configuration error(s)", errors.len());
    }

    init_tracing(&config.logging)?;
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        anyhow::bail!("Invalid configuration");
    }

    info!("msgate worker starting (msgated)");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let daemon = Daemon::new(&config, cli.reset_counters, shutdown_token).await?;
    let result = daemon.run().await;

    match &result {
        Ok(()) => info!("msgate worker shut down gracefully"),
        Err(e) => error!(error = %e, "msgate worker exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;
    use msgate_core::config::ConfigBuilder;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from(["msgated", "--config", "/etc/msgate.yaml", "--check-config"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/msgate.yaml")));
        assert!(cli.check_config);
        assert!(!cli.reset_counters);
    }

    #[test]
    fn explicit_config_must_exist() {
        let missing = PathBuf::from("/nonexistent/msgate/config.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  bind: 127.0.0.1:9999\nlimits:\n  concurrency_limit: 3\nstore:\n  backend: memory"
        )
        .unwrap();

        let config = load_config(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9999");
        assert_eq!(config.limits.concurrency_limit, 3);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[tokio::test]
    async fn sqlite_store_is_created_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: dir.path().join("counters.db"),
        };

        let store = build_store(&config, false).await.unwrap();
        store.increment("concurrency:acme").await.unwrap();
        assert_eq!(store.read("concurrency:acme").await.unwrap(), 1);

        let store = build_store(&config, true).await.unwrap();
        assert_eq!(store.read("concurrency:acme").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn daemon_stops_on_cancel() {
        let config = ConfigBuilder::new()
            .bind("127.0.0.1:0")
            .store_backend(StoreBackend::Memory)
            .build();
        let shutdown = CancellationToken::new();

        let daemon = Daemon::new(&config, false, shutdown.clone()).await.unwrap();
        let task = tokio::spawn(daemon.run());

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn daemon_reports_bind_failure() {
        let config = ConfigBuilder::new()
            .bind("not-an-address")
            .store_backend(StoreBackend::Memory)
            .build();
        let result = Daemon::new(&config, false, CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
