//! Environment-driven configuration structures shared by all binaries.

use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_FAILURE_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEDUP_CAPACITY: usize = 256;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 2_000;

/// Where the monitored account registry is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSource {
    /// SeaORM connection string for the shared monitor registry.
    Database(String),
    /// JSON accounts file used by the headless monitor.
    File(String),
}

/// Settings for the monitoring engine: upstream endpoint, watcher cadence
/// and the local alert player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    rpc_url: String,
    account_source: AccountSource,
    poll_interval: Duration,
    failure_interval: Duration,
    rpc_timeout: Duration,
    dedup_capacity: usize,
    alert_player: Option<String>,
    warning_audio: Option<String>,
    skip_migrations: bool,
}

impl MonitorConfig {
    /// Builds a config with default cadence for the given endpoint.
    pub fn new(rpc_url: impl Into<String>, account_source: AccountSource) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            account_source,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            failure_interval: Duration::from_millis(DEFAULT_FAILURE_INTERVAL_MS),
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            alert_player: None,
            warning_audio: None,
            skip_migrations: false,
        }
    }

    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// monitor variables. `MONITOR_ACCOUNTS_FILE` takes precedence over
    /// `DATABASE_URL` as the account source.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let rpc_url = get_required_var("SUI_RPC_URL")?;
        let account_source = match get_optional_var("MONITOR_ACCOUNTS_FILE") {
            Some(path) => AccountSource::File(path),
            None => AccountSource::Database(get_required_var("DATABASE_URL")?),
        };

        let poll_ms = get_number_var("MONITOR_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let failure_ms =
            get_number_var("MONITOR_FAILURE_INTERVAL_MS", DEFAULT_FAILURE_INTERVAL_MS)?;
        let timeout_ms = get_number_var("MONITOR_RPC_TIMEOUT_MS", DEFAULT_RPC_TIMEOUT_MS)?;
        let dedup_capacity = get_number_var("MONITOR_DEDUP_CAPACITY", DEFAULT_DEDUP_CAPACITY)?;

        let mut config = Self::new(rpc_url, account_source)
            .with_intervals(
                Duration::from_millis(poll_ms),
                Duration::from_millis(failure_ms),
            )?
            .with_rpc_timeout(Duration::from_millis(timeout_ms))?;
        config.dedup_capacity = non_zero("MONITOR_DEDUP_CAPACITY", dedup_capacity)?;
        config.alert_player = get_optional_var("MONITOR_ALERT_PLAYER");
        config.warning_audio = get_optional_var("MONITOR_WARNING_AUDIO");
        config.skip_migrations = get_flag_var("MONITOR_SKIP_MIGRATIONS");
        Ok(config)
    }

    /// Overrides the watcher cadence. The failure interval must be strictly
    /// longer than the success interval so failing watchers back off.
    pub fn with_intervals(
        mut self,
        poll_interval: Duration,
        failure_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if poll_interval.is_zero() || failure_interval <= poll_interval {
            return Err(ConfigError::InvalidInterval {
                poll_ms: poll_interval.as_millis() as u64,
                failure_ms: failure_interval.as_millis() as u64,
            });
        }
        self.poll_interval = poll_interval;
        self.failure_interval = failure_interval;
        Ok(self)
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                key: "MONITOR_RPC_TIMEOUT_MS",
            });
        }
        self.rpc_timeout = timeout;
        Ok(self)
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn account_source(&self) -> &AccountSource {
        &self.account_source
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn failure_interval(&self) -> Duration {
        self.failure_interval
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub fn dedup_capacity(&self) -> usize {
        self.dedup_capacity
    }

    pub fn alert_player(&self) -> Option<&str> {
        self.alert_player.as_deref()
    }

    pub fn warning_audio(&self) -> Option<&str> {
        self.warning_audio.as_deref()
    }

    /// Whether the registry schema is owned elsewhere and must not be
    /// created by this process.
    pub fn skip_migrations(&self) -> bool {
        self.skip_migrations
    }
}

/// API-specific configuration (HTTP bind + subscriber fan-out) so the HTTP
/// surface does not depend on monitor-only environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    api_bind_address: String,
    api_unix_socket: Option<String>,
    internal_bind_address: Option<String>,
    internal_unix_socket: Option<String>,
    subscriber_buffer: usize,
    send_timeout: Duration,
}

impl ApiConfig {
    /// Loads only the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let subscriber_buffer = non_zero(
            "HUB_SUBSCRIBER_BUFFER",
            get_number_var("HUB_SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER)?,
        )?;
        let send_timeout_ms = non_zero(
            "HUB_SEND_TIMEOUT_MS",
            get_number_var("HUB_SEND_TIMEOUT_MS", DEFAULT_SEND_TIMEOUT_MS)?,
        )?;

        Ok(Self {
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            api_unix_socket: get_optional_var("API_UNIX_SOCKET"),
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            internal_unix_socket: get_optional_var("API_INTERNAL_UNIX_SOCKET"),
            subscriber_buffer,
            send_timeout: Duration::from_millis(send_timeout_ms),
        })
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn api_unix_socket(&self) -> Option<&str> {
        self.api_unix_socket.as_deref()
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn internal_unix_socket(&self) -> Option<&str> {
        self.internal_unix_socket.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some() || self.internal_unix_socket.is_some()
    }

    pub fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

fn get_flag_var(key: &'static str) -> bool {
    get_optional_var(key)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn non_zero<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialEq + Default,
{
    if value == T::default() {
        Err(ConfigError::ZeroValue { key })
    } else {
        Ok(value)
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("SUI_WATCH_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` must be greater than zero")]
    ZeroValue { key: &'static str },
    #[error("failure interval ({failure_ms}ms) must be longer than poll interval ({poll_ms}ms)")]
    InvalidInterval { poll_ms: u64, failure_ms: u64 },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
