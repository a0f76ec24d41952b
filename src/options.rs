//! Options structures for transport and stream configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::StreamError;
use crate::pacing::Pacing;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Generic transport options containing truly generic transport fields
/// and transport-specific configuration.
///
/// # Example
/// ```rust
/// use fetchstream::options::{HttpTransport, TransportOptions};
/// use std::time::Duration;
///
/// let options = TransportOptions {
///     timeout: Some(Duration::from_secs(30)),
///     provider: HttpTransport::new("http://localhost:8080"),
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransportOptions<T> {
    /// Request timeout. A hung stream read is only bounded by this.
    pub timeout: Option<Duration>,

    /// Transport-specific options
    pub provider: T,
}

impl<T> TransportOptions<T> {
    /// Create new transport options with transport-specific configuration.
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP-specific transport options.
/// Used as the provider field in `TransportOptions<HttpTransport>`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// Bearer token sent as `Authorization`, if any
    pub api_key: Option<SecretString>,

    /// Base URL that request endpoints are appended to
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    /// Create new HTTP transport options for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: Some(base_url.into()),
            proxy: None,
            extra_headers: None,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Options for one reassembly loop.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Pause inserted after each emitted value.
    pub pacing: Pacing,

    /// Attempt a last decode of leftover carry-over text when the source closes.
    pub flush_on_close: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            flush_on_close: true,
        }
    }
}

impl StreamOptions {
    /// Set the pacing strategy.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Enable or disable the final carry-over decode on close.
    pub fn with_flush_on_close(mut self, flush: bool) -> Self {
        self.flush_on_close = flush;
        self
    }

    /// Check the options for inconsistent values.
    pub fn validate(&self) -> Result<(), StreamError> {
        self.pacing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::from("sk-123");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "sk-123");
    }

    #[test]
    fn test_with_header_accumulates() {
        let transport = HttpTransport::new("http://localhost")
            .with_header("x-a".to_string(), "1".to_string())
            .with_header("x-b".to_string(), "2".to_string());
        assert_eq!(transport.extra_headers.map(|h| h.len()), Some(2));
    }

    #[test]
    fn test_stream_options_default() {
        let options = StreamOptions::default();
        assert!(options.flush_on_close);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_stream_options_rejects_inverted_range() {
        let options = StreamOptions::default().with_pacing(Pacing::Random {
            min: Duration::from_millis(20),
            max: Duration::from_millis(10),
        });
        assert!(matches!(options.validate(), Err(StreamError::Config(_))));
    }
}
