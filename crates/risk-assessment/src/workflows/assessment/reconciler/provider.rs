use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalizer::RawCandidate;
use crate::config::ProviderConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRequest {
    pub query: String,
    pub limit: usize,
}

/// Provider response after per-record normalization. Records that could not
/// be normalized are dropped, not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionResponse {
    pub results: Vec<RawCandidate>,
    pub method: Option<String>,
    pub sector_count: usize,
    pub general_count: usize,
    pub matched_tags: Vec<String>,
    pub count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("suggestion provider is not configured")]
    NotConfigured,
    #[error("suggestion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected suggestion response: {0}")]
    InvalidResponse(String),
}

/// External sector-suggestion source consulted by the search phase.
pub trait SuggestionProvider: Send + Sync {
    fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> impl Future<Output = Result<SuggestionResponse, ProviderError>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionPayload {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    sector_count: usize,
    #[serde(default)]
    general_count: usize,
    #[serde(default)]
    matched_tags: Vec<String>,
    #[serde(default)]
    count: Option<usize>,
}

pub fn parse_suggestion_response(json: Value) -> Result<SuggestionResponse, ProviderError> {
    if !json.is_object() {
        return Err(ProviderError::InvalidResponse(
            "response body is not an object".to_string(),
        ));
    }
    let payload: SuggestionPayload = serde_json::from_value(json)
        .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

    let count = payload.count.unwrap_or(payload.results.len());
    let results = payload
        .results
        .iter()
        .filter_map(RawCandidate::from_value)
        .collect();

    Ok(SuggestionResponse {
        results,
        method: payload.method,
        sector_count: payload.sector_count,
        general_count: payload.general_count,
        matched_tags: payload.matched_tags,
        count,
    })
}

/// JSON-over-HTTP provider: `POST {query, limit}` to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpSuggestionProvider {
    client: Client,
    endpoint: Option<String>,
}

impl HttpSuggestionProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl SuggestionProvider for HttpSuggestionProvider {
    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        let endpoint = self.endpoint.as_deref().ok_or(ProviderError::NotConfigured)?;
        let json: Value = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_suggestion_response(json)
    }
}
