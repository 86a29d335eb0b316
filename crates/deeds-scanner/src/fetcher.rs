//! Transport seam between the orchestrator and the registry.
//!
//! [`PageFetcher`] is what the orchestrator talks to; [`HttpFetcher`] is the
//! reqwest implementation used in production. Tests substitute their own.

use crate::error::{Result, ScanError};
use crate::form::{FormRequest, HttpMethod};
use async_trait::async_trait;
use deeds_core::HttpConfig;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Sends one request and returns the response body.
///
/// Implementations classify failures into [`ScanError`] variants so the
/// orchestrator can decide what to retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &FormRequest) -> Result<String>;
}

/// reqwest-backed fetcher with a cookie jar for the ASP.NET session.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScanError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FormRequest) -> Result<String> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.fields),
        };

        tracing::debug!(
            "{:?} {} ({} form fields)",
            request.method,
            request.url,
            request.fields.len()
        );

        let response = builder.send().await.map_err(|source| ScanError::Network {
            url: request.url.clone(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map_or(Duration::ZERO, Duration::from_secs);

            return Err(ScanError::RateLimited {
                url: request.url.clone(),
                retry_after,
            });
        }
        if status.is_server_error() {
            return Err(ScanError::ServerError {
                url: request.url.clone(),
                http_status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: request.url.clone(),
                http_status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| ScanError::Network {
            url: request.url.clone(),
            source,
        })
    }
}
