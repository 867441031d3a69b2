//! Client configuration.
//!
//! Defaults match the behavior callers get with no configuration at all: a
//! 30 second timeout, redirects followed, and no base URL (relative endpoints
//! are passed through unchanged).

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::options::parse_flag;

pub const ENV_BASE_URL: &str = "FLUENT_CURL_BASE_URL";
pub const ENV_TIMEOUT: &str = "FLUENT_CURL_TIMEOUT";
pub const ENV_RESTRICTED: &str = "FLUENT_CURL_RESTRICTED";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base that relative endpoints are joined onto.
    pub base_url: Option<String>,

    /// Timeout applied when the caller sets none.
    pub default_timeout_secs: u64,

    /// Host runs with restricted-mode protections. Redirects are then never
    /// followed by default; an explicit FOLLOWLOCATION option still applies.
    pub restricted_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            restricted_mode: false,
        }
    }
}

impl ClientConfig {
    /// Read overrides from `FLUENT_CURL_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = Some(base.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.default_timeout_secs = raw.trim().parse().map_err(|_| ConfigurationError::InvalidEnv {
                name: ENV_TIMEOUT,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_RESTRICTED) {
            config.restricted_mode = parse_flag(&raw).ok_or(ConfigurationError::InvalidEnv {
                name: ENV_RESTRICTED,
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    /// Expand a relative endpoint against `base_url`. Absolute URLs, and every
    /// endpoint when no base is configured, are returned unchanged.
    pub fn resolve(&self, endpoint: &str) -> String {
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }
}
