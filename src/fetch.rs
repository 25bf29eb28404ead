use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, ExtractionError};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const RELAY_TOKEN_HEADER: &str = "x-relay-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub response_time_ms: u64,
}

/// Raw page retrieval used by the price extractor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ExtractionError>;
}

fn build_client(config: &ScraperConfig) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .map_err(|e| AppError::Internal(format!("Invalid user agent: {}", e)))?,
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)
            .map_err(|e| AppError::Internal(format!("Invalid accept language: {}", e)))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .build()?)
}

async fn read_page(
    request: reqwest::RequestBuilder,
    url: &str,
    start_time: Instant,
) -> Result<FetchedPage, ExtractionError> {
    let response = request.send().await.map_err(ExtractionError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExtractionError::HttpStatus(status.as_u16()));
    }

    let body = response.text().await.map_err(ExtractionError::from_reqwest)?;

    Ok(FetchedPage {
        url: url.to_string(),
        status: status.as_u16(),
        body,
        response_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

/// Fetches retailer pages directly with a browser-like identity.
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for DirectFetcher {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ExtractionError> {
        let parsed = url::Url::parse(url).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;
        read_page(self.client.get(parsed), url, Instant::now()).await
    }
}

/// Routes every fetch through a pass-through relay (`GET relay?url=<target>`)
/// that returns the target's body verbatim. Used when retailers block the
/// runner's own network origin.
pub struct RelayFetcher {
    client: Client,
    relay_url: url::Url,
    token: Option<String>,
}

impl RelayFetcher {
    pub fn new(config: &ScraperConfig, relay_url: &str) -> Result<Self, AppError> {
        let relay_url = url::Url::parse(relay_url)
            .map_err(|e| AppError::Internal(format!("Invalid relay url: {}", e)))?;
        Ok(Self {
            client: build_client(config)?,
            relay_url,
            token: config.relay_token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl PageFetcher for RelayFetcher {
    fn name(&self) -> &str {
        "relay"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ExtractionError> {
        url::Url::parse(url).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;

        let mut request = self.client.get(self.relay_url.clone()).query(&[("url", url)]);
        if let Some(token) = &self.token {
            request = request.header(RELAY_TOKEN_HEADER, token);
        }
        read_page(request, url, Instant::now()).await
    }
}

/// Direct fetching unless a relay is configured.
pub fn build_fetcher(config: &ScraperConfig) -> Result<Arc<dyn PageFetcher>, AppError> {
    match config.relay_url.as_deref().filter(|u| !u.is_empty()) {
        Some(relay) => {
            tracing::info!("Fetching pages through relay {}", relay);
            Ok(Arc::new(RelayFetcher::new(config, relay)?))
        }
        None => Ok(Arc::new(DirectFetcher::new(config)?)),
    }
}
