//! Account configuration.
//!
//! Configuration for the hosted-backend gateway. Values should be provided
//! by the application shell, not hardcoded.

use std::time::Duration;

/// Default timeout applied to backend requests and flow dispatches.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted-backend configuration.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Project base URL (e.g. `https://project.example.co`).
    pub base_url: String,

    /// Publishable API key sent with every request.
    pub publishable_key: String,

    /// Key under which the session JSON is persisted locally.
    ///
    /// Default: `shortloop-session`
    pub storage_key: String,

    /// Per-request timeout.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl AccountConfig {
    /// Create a new configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project base URL (no trailing slash required)
    /// * `publishable_key` - Publishable API key
    #[must_use]
    pub fn new(base_url: String, publishable_key: String) -> Self {
        Self {
            base_url,
            publishable_key,
            storage_key: "shortloop-session".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the local storage key for the persisted session.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self::new(
            "http://localhost:54321".to_string(),
            "publishable-key".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AccountConfig::new("https://api.example.com/".to_string(), "pk".to_string())
            .with_storage_key("my-session")
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.trimmed_base_url(), "https://api.example.com");
        assert_eq!(config.storage_key, "my-session");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_default_config() {
        let config = AccountConfig::default();
        assert_eq!(config.storage_key, "shortloop-session");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
