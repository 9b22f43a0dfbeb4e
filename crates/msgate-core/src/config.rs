//! Configuration module for msgate.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::TenantId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub window: WindowConfig,
    pub push: PushConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    /// Per-tenant overrides keyed by tenant id.
    pub tenants: BTreeMap<String, TenantOverride>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`.
    pub bind: String,
    /// Path prefix the message API is exposed on.
    pub web_path: String,
    /// Path answering health checks.
    pub health_path: String,
}

/// Admission-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrent requests per tenant across all workers.
    /// A value below zero disables the check. Over-limit requests are rejected.
    pub concurrency_limit: i64,
    /// Maximum concurrent requests per tenant inside one worker.
    /// A value below zero disables the limit. Over-limit requests are queued.
    pub worker_concurrency_limit: i64,
    /// Namespace prefix for shared counter keys.
    pub counter_namespace: String,
}

/// Delivery window pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum number of in-flight entries per window.
    pub max_in_flight: usize,
    /// Seconds an in-flight entry may stay unacknowledged before it expires.
    pub flight_ttl_secs: u64,
    /// Seconds between pacing scans.
    pub monitor_interval_secs: u64,
    /// Remove windows once they hold no pending or in-flight entries.
    pub cleanup: bool,
}

/// Push relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Seconds to wait for a tenant callback server to respond.
    pub timeout_secs: u64,
}

/// Which shared counter store backs the distributed admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// SQLite database file shared by all workers on the host.
    Sqlite,
    /// Process-local counters; only meaningful for a single worker.
    Memory,
}

/// Shared counter store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Path to the SQLite database (ignored for the memory backend).
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Optional per-tenant settings; unset fields fall back to the global values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantOverride {
    pub concurrency_limit: Option<i64>,
    pub push_message_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not load configuration, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/msgate/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("msgate")
            .join("config.yaml")
    }
}

impl WindowConfig {
    /// Flight lifetime as a [`Duration`].
    pub fn flight_ttl(&self) -> Duration {
        Duration::from_secs(self.flight_ttl_secs)
    }

    /// Pacing scan interval as a [`Duration`].
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

impl PushConfig {
    /// Push timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            web_path: "/api/v1/go/http_api".to_string(),
            health_path: "/health/".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 10,
            worker_concurrency_limit: 1,
            counter_namespace: "concurrency".to_string(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 100,
            flight_ttl_secs: 100,
            monitor_interval_secs: 20,
            cleanup: true,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("msgate")
                .join("counters.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"window.max_in_flight"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.bind".into(),
                message: format!("not a socket address: {}", self.server.bind),
            });
        }
        for (field, value) in [
            ("server.web_path", &self.server.web_path),
            ("server.health_path", &self.server.health_path),
        ] {
            if !value.starts_with('/') {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must start with '/'".into(),
                });
            }
        }

        // --- limits ---
        if self.limits.counter_namespace.is_empty() || self.limits.counter_namespace.contains(':')
        {
            errors.push(ValidationError {
                field: "limits.counter_namespace".into(),
                message: "must be non-empty and must not contain ':'".into(),
            });
        }

        // --- window ---
        if self.window.max_in_flight == 0 {
            errors.push(ValidationError {
                field: "window.max_in_flight".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.window.flight_ttl_secs == 0 {
            errors.push(ValidationError {
                field: "window.flight_ttl_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.window.monitor_interval_secs == 0 {
            errors.push(ValidationError {
                field: "window.monitor_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- push ---
        if self.push.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "push.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- tenants ---
        for (name, tenant) in &self.tenants {
            if TenantId::new(name.as_str()).is_err() {
                errors.push(ValidationError {
                    field: format!("tenants.{name}"),
                    message: "invalid tenant id".into(),
                });
            }
            if let Some(url) = &tenant.push_message_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    errors.push(ValidationError {
                        field: format!("tenants.{name}.push_message_url"),
                        message: format!("unsupported scheme: {url}"),
                    });
                }
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use msgate_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .concurrency_limit(1)
///     .worker_concurrency_limit(2)
///     .tenant_concurrency_limit("acme", 5)
///     .build();
/// assert_eq!(config.limits.worker_concurrency_limit, 2);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    pub fn web_path(mut self, path: impl Into<String>) -> Self {
        self.config.server.web_path = path.into();
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.server.health_path = path.into();
        self
    }

    // --- limits ---

    pub fn concurrency_limit(mut self, limit: i64) -> Self {
        self.config.limits.concurrency_limit = limit;
        self
    }

    pub fn worker_concurrency_limit(mut self, limit: i64) -> Self {
        self.config.limits.worker_concurrency_limit = limit;
        self
    }

    pub fn counter_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.limits.counter_namespace = namespace.into();
        self
    }

    // --- window ---

    pub fn window_max_in_flight(mut self, n: usize) -> Self {
        self.config.window.max_in_flight = n;
        self
    }

    pub fn window_flight_ttl_secs(mut self, secs: u64) -> Self {
        self.config.window.flight_ttl_secs = secs;
        self
    }

    pub fn window_monitor_interval_secs(mut self, secs: u64) -> Self {
        self.config.window.monitor_interval_secs = secs;
        self
    }

    pub fn window_cleanup(mut self, cleanup: bool) -> Self {
        self.config.window.cleanup = cleanup;
        self
    }

    // --- push ---

    pub fn push_timeout_secs(mut self, secs: u64) -> Self {
        self.config.push.timeout_secs = secs;
        self
    }

    // --- store ---

    pub fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.config.store.backend = backend;
        self
    }

    pub fn store_path(mut self, path: PathBuf) -> Self {
        self.config.store.path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- tenants ---

    pub fn tenant_concurrency_limit(mut self, tenant: impl Into<String>, limit: i64) -> Self {
        self.config
            .tenants
            .entry(tenant.into())
            .or_default()
            .concurrency_limit = Some(limit);
        self
    }

    pub fn tenant_push_url(mut self, tenant: impl Into<String>, url: impl Into<String>) -> Self {
        self.config
            .tenants
            .entry(tenant.into())
            .or_default()
            .push_message_url = Some(url.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
