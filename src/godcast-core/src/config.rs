//! Connection settings for the external generation and synthesis
//! services.

use std::time::Duration;

/// Settings shared by the dialogue generation and speech synthesis
/// clients. Both services live behind the same host and accept the
/// same publishable key.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the service host.
    pub base_url: String,
    /// Publishable API key sent with every request.
    pub api_key: String,
    /// Upper bound on a whole request/response exchange.
    pub request_timeout: Duration,
    /// Upper bound on establishing the connection.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Override the default timeouts.
    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    /// Build the HTTP client both service clients share.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
    }

    /// Full URL for a hosted function.
    pub(crate) fn endpoint(&self, function: &str) -> String {
        format!(
            "{}/functions/v1/{}",
            self.base_url.trim_end_matches('/'),
            function
        )
    }
}
