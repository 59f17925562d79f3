//! Client configuration and environment loading.

use std::time::Duration;

/// Ticks between the observed tick and the scheduled tick when nothing else is configured.
pub const DEFAULT_TICK_OFFSET: u32 = 15;
/// Public gateway used when no URL is configured.
pub const DEFAULT_RPC_URL: &str = "https://rpc.qubic.org";

/// Gateway base URL variable.
pub const RPC_URL_ENV: &str = "QUBIC_RPC_URL";
/// Scheduling offset variable.
pub const TICK_OFFSET_ENV: &str = "QUBIC_TICK_OFFSET";
/// Per-request timeout variable, in milliseconds.
pub const HTTP_TIMEOUT_MS_ENV: &str = "QUBIC_HTTP_TIMEOUT_MS";

/// Settings shared by the submission and query clients.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClientConfig {
    /// Gateway base URL.
    pub rpc_url: String,
    /// Ticks added to the current tick to obtain the target tick.
    pub tick_offset: u32,
    /// Optional HTTP request timeout; none by default.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            tick_offset: DEFAULT_TICK_OFFSET,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Reads configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(read_env_var)
    }

    /// Reads configuration through `lookup`, falling back to defaults for absent or
    /// unparsable values.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let rpc_url = lookup(RPC_URL_ENV)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.rpc_url);
        let tick_offset = lookup(TICK_OFFSET_ENV)
            .and_then(|value| parse_tick_offset(&value))
            .unwrap_or(defaults.tick_offset);
        let request_timeout = lookup(HTTP_TIMEOUT_MS_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_millis);
        Self {
            rpc_url,
            tick_offset,
            request_timeout,
        }
    }

    /// Sets the gateway base URL.
    #[must_use]
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Sets the scheduling offset.
    #[must_use]
    pub const fn with_tick_offset(mut self, tick_offset: u32) -> Self {
        self.tick_offset = tick_offset;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Returns a config with a scheduling offset of at least one tick.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            tick_offset: self.tick_offset.max(1),
            ..self
        }
    }
}

/// Parses a scheduling offset. Zero, negative, and non-numeric text yield `None`, which callers
/// replace with [`DEFAULT_TICK_OFFSET`].
#[must_use]
pub fn parse_tick_offset(value: &str) -> Option<u32> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|offset| *offset > 0)
}

/// Returns a non-empty environment variable.
fn read_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
