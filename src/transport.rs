//! Search API transport / 搜索API传输层
//!
//! `SearchTransport` is the seam the orchestrator consumes. The HTTP
//! implementation enforces the per-request timeout itself; callers only
//! ever see a `SearchError`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::AppConfig;
use crate::error::{Result, SearchError};
use crate::models::{CategorizedResultSet, SearchQuery, SearchResponse};

#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Run one search round / 执行一轮搜索
    async fn fetch_results(&self, query: &SearchQuery) -> Result<CategorizedResultSet>;

    /// Probe the API; `Ok` means reachable / 健康检查
    async fn check_health(&self) -> Result<()>;
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

/// reqwest-backed transport / HTTP 传输实现
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| SearchError::Config(format!("Invalid API address {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.api_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn fetch_results(&self, query: &SearchQuery) -> Result<CategorizedResultSet> {
        let url = self.endpoint("/api/search");
        let request = query.to_request();
        tracing::debug!("POST {} kw={:?} cloud_types={:?}", url, request.kw, request.cloud_types);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorPayload>(&text)
                .ok()
                .and_then(|p| p.message);
            tracing::debug!("Search API returned {}: {}", status, text);
            return Err(SearchError::server(Some(status.as_u16()), message));
        }

        let parsed: SearchResponse = serde_json::from_str(&text)?;
        let result = parsed.into_result_set()?;
        tracing::debug!(
            "Search API returned {} links in {} categories",
            result.total(),
            result.category_count()
        );
        Ok(result)
    }

    async fn check_health(&self) -> Result<()> {
        let response = self.client.get(self.endpoint("/api/health")).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SearchError::server(Some(status.as_u16()), None))
        }
    }
}
