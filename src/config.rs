use std::time::Duration;

use crate::backend::{DEFAULT_API_URL, DEFAULT_BACKEND_TIMEOUT_SECS};
use crate::poller::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_TIMEOUT_MS, PollSettings};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub bind_addr: String,
    pub backend_timeout: Duration,
    pub poll: PollSettings,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Reads the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparsable values fall back to
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_ms = parse_or(&lookup, "ANSWER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS, |ms| {
            *ms > 0
        });
        // Deadline must not come before the first tick.
        let timeout_ms =
            parse_or(&lookup, "ANSWER_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT_MS, |_| true).max(interval_ms);

        Self {
            api_url: api_url(&lookup),
            bind_addr: lookup("BIND_ADDR")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            backend_timeout: Duration::from_secs(parse_or(
                &lookup,
                "BACKEND_TIMEOUT_SECS",
                DEFAULT_BACKEND_TIMEOUT_SECS,
                |secs| *secs > 0,
            )),
            poll: PollSettings {
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_millis(timeout_ms),
            },
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES, |bytes| {
                *bytes > 0
            }),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            poll: PollSettings::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn api_url<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("API_URL")
        .or_else(|| lookup("NEXT_PUBLIC_API_URL"))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .filter(|value| valid(value))
        .unwrap_or(default)
}
