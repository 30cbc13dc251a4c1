//! HTTP client for the document search index.

use async_trait::async_trait;
use forecastiq_core::{Error, SearchConfig};
use reqwest::Client;
use tracing::debug;

use crate::dispatcher::SearchBackend;
use crate::types::{RetrievalError, SearchDocument, SearchRequest, SearchResponse};

/// Posts search requests to `{endpoint}/indexes/{index}/docs/search`.
pub struct HttpSearchBackend {
    client: Client,
    config: SearchConfig,
}

impl HttpSearchBackend {
    /// Build a client bounded by the configured timeout.
    pub fn new(config: SearchConfig) -> forecastiq_core::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Http(format!("Failed to build search client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, RetrievalError> {
        if !self.config.is_configured() {
            return Err(RetrievalError::NotConfigured);
        }

        let url = self.config.search_url();
        debug!("POST {} ({:?})", url, request.route());

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("api-key", key);
        }

        let response = builder.send().await.map_err(map_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status { status, body });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::Timeout
            } else {
                RetrievalError::Decode(e.to_string())
            }
        })?;
        Ok(parsed.value)
    }
}

fn map_transport(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout
    } else {
        RetrievalError::Transport(e.to_string())
    }
}
