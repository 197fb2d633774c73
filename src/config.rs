//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::GatewayError;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:4000`).
    pub listen_addr: SocketAddr,

    /// Route the WebSocket upgrade is served on.
    pub ws_path: String,

    /// Settings handed to every accepted connection.
    pub connection: ConnectionConfig,

    /// Delay before the demo `example` subscription yields its value.
    pub demo_example_delay: Duration,

    /// Emit JSON log lines instead of human-readable text.
    pub json_logs: bool,
}

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Keep-alive period. `None` disables keep-alive frames entirely.
    pub keep_alive_interval: Option<Duration>,

    /// Capacity of the bounded queue between producers (runners, timer)
    /// and the connection's writer.
    pub outbound_buffer: usize,

    /// Maximum concurrently active operations (0 = unlimited).
    pub max_operations: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: None,
            outbound_buffer: 64,
            max_operations: 0,
        }
    }
}

impl ConnectionConfig {
    /// Returns a copy with keep-alive enabled at `interval`.
    ///
    /// A zero interval disables keep-alive.
    #[must_use]
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Returns a copy limited to `max` concurrent operations.
    #[must_use]
    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`], or if `GRAPHQL_WS_PATH` does not start
    /// with `/`.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4000".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("LISTEN_ADDR: {e}")))?;

        let ws_path = std::env::var("GRAPHQL_WS_PATH").unwrap_or_else(|_| "/graphql".to_string());
        if !ws_path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "GRAPHQL_WS_PATH must start with '/': {ws_path}"
            )));
        }

        let connection = ConnectionConfig {
            keep_alive_interval: parse_env_secs("KEEP_ALIVE_INTERVAL_SECS"),
            outbound_buffer: parse_env("OUTBOUND_BUFFER", 64_usize).max(1),
            max_operations: parse_env("MAX_OPERATIONS_PER_CONNECTION", 0),
        };

        let demo_example_delay = Duration::from_millis(parse_env("DEMO_EXAMPLE_DELAY_MS", 1_500));

        let json_logs = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            ws_path,
            connection,
            demo_example_delay,
            json_logs,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a positive number of seconds.
/// Missing, invalid, zero or negative values yield `None`.
fn parse_env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_secs(&v))
}

fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
