//! Configuration for the orchestration relay.
//!
//! Configuration sources (highest priority first):
//! 1. Explicit overrides (CLI flags, builder methods)
//! 2. Environment variables (EDUSPHERE_BACKEND_URL, EDUSPHERE_*_TIMEOUT_SECS)
//! 3. Defaults (upstream at http://127.0.0.1:8000)
//!
//! The configuration is a plain value passed to whoever needs it; there
//! is no global state.

use std::time::Duration;

/// Environment variable naming the upstream orchestrator base URL.
pub const BACKEND_URL_ENV: &str = "EDUSPHERE_BACKEND_URL";

/// Default upstream base URL when nothing is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

const CONNECT_TIMEOUT_ENV: &str = "EDUSPHERE_CONNECT_TIMEOUT_SECS";
const REQUEST_TIMEOUT_ENV: &str = "EDUSPHERE_REQUEST_TIMEOUT_SECS";

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Default cosmetic delay between stage completions in synchronous mode.
pub fn default_pacing() -> Duration {
    Duration::from_millis(100)
}

/// Settings shared by the relay, the fallback adapter and the coordinator.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream orchestrator base URL (no trailing slash)
    pub base_url: String,

    /// Bound on establishing the upstream connection
    pub connect_timeout: Duration,

    /// Bound on the one-shot request and on each streaming read
    pub request_timeout: Duration,

    /// Inter-stage pacing delay in synchronous mode (cosmetic only;
    /// zero makes the state machine run instantly, which tests rely on)
    pub pacing: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            pacing: default_pacing(),
        }
    }
}

impl RelayConfig {
    /// Resolve configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        Self {
            base_url: normalize_base_url(base_url),
            connect_timeout: env_secs(CONNECT_TIMEOUT_ENV).unwrap_or_else(default_connect_timeout),
            request_timeout: env_secs(REQUEST_TIMEOUT_ENV).unwrap_or_else(default_request_timeout),
            pacing: default_pacing(),
        }
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url.into());
        self
    }

    /// Override the pacing delay (zero for deterministic tests).
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}

fn env_secs(var: &str) -> Option<Duration> {
    std::env::var(var).ok()?.trim().parse().ok().map(Duration::from_secs)
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
