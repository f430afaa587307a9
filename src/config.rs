use std::path::PathBuf;
use std::time::Duration;

use crate::paths::default_state_dir;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_LATENCY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Runtime settings, read from `ADMINBOARD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_port: u16,
    /// Base URL of the HTTP API. `None` runs the in-process mock backends.
    pub api_base: Option<String>,
    pub state_dir: PathBuf,
    pub latency: Duration,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            api_base: None,
            state_dir: default_state_dir(),
            latency: Duration::from_millis(DEFAULT_LATENCY_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Build from an arbitrary lookup. Unparseable numbers fall back to the
    /// defaults; blank strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |k: &str, d: u64| get(k).and_then(|s| s.parse::<u64>().ok()).unwrap_or(d);
        Self {
            http_port: get("ADMINBOARD_HTTP_PORT").and_then(|s| s.parse::<u16>().ok()).unwrap_or(DEFAULT_HTTP_PORT),
            api_base: get("ADMINBOARD_API_BASE"),
            state_dir: get("ADMINBOARD_STATE_DIR").map(PathBuf::from).unwrap_or_else(default_state_dir),
            latency: Duration::from_millis(num("ADMINBOARD_LATENCY_MS", DEFAULT_LATENCY_MS)),
            timeout: Duration::from_millis(num("ADMINBOARD_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)),
        }
    }

    pub fn is_remote(&self) -> bool { self.api_base.is_some() }
}
