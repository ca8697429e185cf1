//! HTTP client for retailer page fetching.
//!
//! A thin, politeness-unaware wrapper around reqwest; robots, SSRF and
//! rate limiting live in the fetch policy that drives it.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};

/// HTTP client configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::infrastructure::config::defaults::USER_AGENT.to_string(),
            timeout_seconds: 30,
            follow_redirects: true,
        }
    }
}

/// Shared client; cheap to clone (reqwest pools internally).
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Sends a GET and returns the response regardless of status; the
    /// fetch policy classifies non-2xx codes itself.
    pub async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        tracing::debug!(url, "fetching");
        self.client.get(url).send().await
    }

    /// Bare reqwest handle for auxiliary requests (robots.txt).
    pub fn inner(&self) -> Client {
        self.client.clone()
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }
}
