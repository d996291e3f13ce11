//! # Builder for WebImageConfig
//!
//! Fluent construction of [`WebImageConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use webimage_engine::WebImageConfig;
//!
//! let config = WebImageConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_connect_timeout(Duration::from_secs(15))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .with_follow_redirects(true)
//!     .build();
//! assert_eq!(config.timeout, Duration::from_secs(60));
//! ```

use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use crate::WebImageConfig;

/// Builder for creating WebImageConfig instances with a fluent API
#[derive(Debug, Clone, Default)]
pub struct WebImageConfigBuilder {
    /// Internal config being built
    config: WebImageConfig,
}

impl WebImageConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: WebImageConfig::default(),
        }
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether redirects are followed
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom header sent with every request. Invalid names or
    /// values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            value.parse::<HeaderValue>(),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> WebImageConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = WebImageConfigBuilder::new()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent")
            .with_follow_redirects(false)
            .build();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
        assert!(!config.follow_redirects);
    }

    #[test]
    fn custom_headers_merge_with_defaults() {
        let config = WebImageConfigBuilder::new()
            .with_header("x-api-key", "secret")
            .build();

        assert!(config.headers.contains_key("x-api-key"));
        assert!(config.headers.contains_key(reqwest::header::ACCEPT));
    }

    #[test]
    fn invalid_header_is_ignored() {
        let config = WebImageConfigBuilder::new()
            .with_header("bad header name", "v")
            .build();
        assert_eq!(config.headers.len(), WebImageConfig::default().headers.len());
    }
}
