//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Only an unparsable `LISTEN_ADDR` is
//! fatal; every other key falls back to its default.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::connection::AdapterSettings;
use crate::connection::adapter::CLOSE_GRACE;
use crate::domain::TraceMode;
use crate::hub::HubSettings;

/// Default bind address.
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Output format of the `tracing` subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Configuration errors that prevent startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    InvalidListenAddr {
        /// The rejected value.
        value: String,
        /// Parser error.
        source: std::net::AddrParseError,
    },
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Slots in each connection's outbound queue.
    pub outbound_queue_capacity: usize,

    /// Pending requests each hub channel can buffer.
    pub hub_channel_capacity: usize,

    /// Whether senders receive their own messages.
    pub deliver_to_sender: bool,

    /// Evict a client after this many consecutive drops (0 = never).
    pub max_consecutive_drops: u32,

    /// Close idle connections after this many seconds (0 = never).
    pub idle_timeout_secs: u64,

    /// Which lifecycle tracer to install.
    pub trace_mode: TraceMode,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for HubConfig {
    fn default() -> Self {
        let hub = HubSettings::default();
        let adapter = AdapterSettings::default();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            outbound_queue_capacity: adapter.outbound_capacity,
            hub_channel_capacity: hub.channel_capacity,
            deliver_to_sender: hub.deliver_to_sender,
            max_consecutive_drops: hub.max_consecutive_drops,
            idle_timeout_secs: 0,
            trace_mode: TraceMode::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidListenAddr`] if `LISTEN_ADDR` is set
    /// but cannot be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidListenAddr`] on an unparsable
    /// `LISTEN_ADDR`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: raw_addr.clone(),
                source,
            })?;

        Ok(Self {
            listen_addr,
            outbound_queue_capacity: parse_num(lookup("OUTBOUND_QUEUE_CAPACITY"))
                .unwrap_or(defaults.outbound_queue_capacity)
                .max(1),
            hub_channel_capacity: parse_num(lookup("HUB_CHANNEL_CAPACITY"))
                .unwrap_or(defaults.hub_channel_capacity)
                .max(1),
            deliver_to_sender: parse_bool(lookup("DELIVER_TO_SENDER"), defaults.deliver_to_sender),
            max_consecutive_drops: parse_num(lookup("MAX_CONSECUTIVE_DROPS"))
                .unwrap_or(defaults.max_consecutive_drops),
            idle_timeout_secs: parse_num(lookup("IDLE_TIMEOUT_SECS"))
                .unwrap_or(defaults.idle_timeout_secs),
            trace_mode: lookup("TRACE_MODE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.trace_mode),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
        })
    }

    /// Settings for the hub control loop.
    #[must_use]
    pub const fn hub_settings(&self) -> HubSettings {
        HubSettings {
            channel_capacity: self.hub_channel_capacity,
            deliver_to_sender: self.deliver_to_sender,
            max_consecutive_drops: self.max_consecutive_drops,
        }
    }

    /// Settings applied to every connection adapter.
    #[must_use]
    pub const fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            outbound_capacity: self.outbound_queue_capacity,
            idle_timeout: if self.idle_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.idle_timeout_secs))
            },
            close_grace: CLOSE_GRACE,
        }
    }
}

/// Parses a number, returning `None` on missing or invalid values.
fn parse_num<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Parses a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
