//! Client configuration.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://zneitiz.herokuapp.com/image/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const BASE_URL_ENV: &str = "NEITIZ_BASE_URL";
pub const TIMEOUT_ENV: &str = "NEITIZ_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Always ends with exactly one `/`.
    pub base_url: String,
    pub user_agent: String,
    /// Used by sessions the client creates itself.
    pub timeout: Duration,
    /// Record 429 reset windows and reject calls until they elapse.
    pub track_ratelimits: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            track_ratelimits: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `NEITIZ_BASE_URL` and `NEITIZ_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.base_url = normalize_base_url(&url);
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %raw, "ignoring unparseable {TIMEOUT_ENV}"),
            }
        }
        self
    }
}

pub fn default_user_agent() -> String {
    format!("neitiz-client/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}
