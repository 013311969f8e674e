//! Raw page retrieval for listing and detail pages.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::constants::{BROWSER_USER_AGENT, LOGIN_PLACEHOLDER_TITLE};
use crate::error::HarvestError;

/// Source of raw page markup.
///
/// Implementations perform exactly one retrieval per call: no caching and
/// no retries.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `url` and return its body.
    ///
    /// # Errors
    ///
    /// Returns `Network`, `HttpStatus` or `Session` depending on how the
    /// retrieval failed.
    async fn fetch(&self, url: &str) -> Result<String, HarvestError>;
}

/// HTTP page source backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    /// Create a page source whose every request times out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| HarvestError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| HarvestError::Network {
                url: url.to_string(),
                source,
            })?;

        check_session(&body, url)?;
        Ok(body)
    }
}

/// Fail with `Session` when the page is the site's login placeholder.
///
/// # Errors
///
/// Returns `HarvestError::Session` when the `<title>` text equals the
/// placeholder exactly.
pub fn check_session(html: &str, url: &str) -> Result<(), HarvestError> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").expect("Invalid selector");

    if let Some(title) = document.select(&title_selector).next() {
        let text: String = title.text().collect();
        if text.trim() == LOGIN_PLACEHOLDER_TITLE {
            return Err(HarvestError::Session {
                url: url.to_string(),
                title: LOGIN_PLACEHOLDER_TITLE.to_string(),
            });
        }
    }

    Ok(())
}
