#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
pub const MAX_LOOKUP_LATENCY_MS: u64 = 10_000;

pub const ENV_HTTP_BIND: &str = "MULEGUARD_HTTP_BIND";
pub const ENV_LOOKUP_LATENCY_MS: &str = "MULEGUARD_LOOKUP_LATENCY_MS";
pub const ENV_SEED_DEMO_KEYS: &str = "MULEGUARD_SEED_DEMO_KEYS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub http_bind: String,
    /// Artificial delay applied inside each lookup task.
    pub lookup_latency: Duration,
    pub seed_demo_keys: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            http_bind: DEFAULT_HTTP_BIND.to_string(),
            lookup_latency: Duration::ZERO,
            seed_demo_keys: true,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Out-of-range or unparsable values fall back to defaults.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_bind = get(ENV_HTTP_BIND)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let latency_ms = get(ENV_LOOKUP_LATENCY_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v <= MAX_LOOKUP_LATENCY_MS)
            .unwrap_or(0);
        let seed_demo_keys = match get(ENV_SEED_DEMO_KEYS) {
            Some(v) => !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            ),
            None => true,
        };
        Self {
            http_bind,
            lookup_latency: Duration::from_millis(latency_ms),
            seed_demo_keys,
        }
    }
}
