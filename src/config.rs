use once_cell::sync::Lazy;
use std::fs;
use std::time::Duration;

/// Access-key API settings read from the process environment:
/// `ACCESS_KEY_API_BASE_URL` (default `http://127.0.0.1:8080`),
/// `ACCESS_KEY_API_TOKEN_FILE` or `ACCESS_KEY_API_TOKEN` for the bearer token,
/// and `ACCESS_KEY_REQUEST_TIMEOUT_SECS` (default `30`).
pub static ACCESS_KEY_API_CONFIG: Lazy<AccessKeyApiConfig> =
    Lazy::new(|| AccessKeyApiConfig::from_lookup(|key| std::env::var(key).ok()));

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl AccessKeyApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a config from a variable lookup. The process environment goes
    /// through here as well, see [`ACCESS_KEY_API_CONFIG`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: read_optional(&lookup, "ACCESS_KEY_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth_token: read_secret(&lookup, "ACCESS_KEY_API_TOKEN", "ACCESS_KEY_API_TOKEN_FILE"),
            timeout: Duration::from_secs(parse_timeout_secs(lookup(
                "ACCESS_KEY_REQUEST_TIMEOUT_SECS",
            ))),
        }
    }
}

pub fn access_key_api_config_from_env() -> AccessKeyApiConfig {
    ACCESS_KEY_API_CONFIG.clone()
}

fn parse_timeout_secs(raw: Option<String>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

fn read_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_secret<F>(lookup: &F, value_key: &str, file_key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = read_optional(lookup, file_key) {
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    %path,
                    "failed to read {file_key}; falling back to {value_key}"
                );
            }
        }
    }

    read_optional(lookup, value_key)
}
