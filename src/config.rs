use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MediReminder";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// API server used when `MEDIREMINDER_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Per-request timeout used when `MEDIREMINDER_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "MEDIREMINDER_API_URL";
const ENV_TIMEOUT_SECS: &str = "MEDIREMINDER_TIMEOUT_SECS";
const ENV_TOKEN_PATH: &str = "MEDIREMINDER_TOKEN_PATH";

/// Get the application data directory.
/// Platform data dir (e.g. ~/.local/share/medireminder), or ./.medireminder
/// when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("medireminder"),
        None => PathBuf::from(".medireminder"),
    }
}

/// Default location of the persisted bearer token.
pub fn token_path() -> PathBuf {
    app_data_dir().join("token")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medireminder=info,warn"
}

/// Connection settings for the REST client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub token_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_path: token_path(),
        }
    }
}

impl ClientConfig {
    /// Read the config from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Missing or unusable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.api_url = url.to_string();
            }
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_TIMEOUT_SECS,
                    "Ignoring invalid request timeout"
                ),
            }
        }

        if let Some(path) = lookup(ENV_TOKEN_PATH) {
            if !path.trim().is_empty() {
                config.token_path = PathBuf::from(path.trim());
            }
        }

        config
    }
}
