//! HTTP implementation of the fetch primitive
//!
//! One GET per call, no internal retries: retry policy belongs to the worker
//! pool, so every failure is surfaced as a [`FetcherError`] immediately.

use chrono::{FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::tick_parser::TickParser;
use super::user_agent::UserAgentPool;
use super::{FetcherError, FetcherResult, TickFetcher};
use crate::{DateRange, RecordBatch};

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds) - overall time for the entire request
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound the kline endpoint accepts for `tick_count`
pub const MAX_TICK_COUNT: i64 = 4497;

/// Global HTTP client shared by all fetcher instances so connection pooling
/// works across workers.
static GLOBAL_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            panic!("FATAL: Failed to build HTTP client: {e}. Check system TLS configuration.");
        })
});

/// Get the global HTTP client (cheap clone, reqwest clients are reference counted)
pub fn global_http_client() -> Client {
    GLOBAL_HTTP_CLIENT.clone()
}

/// Endpoint and fixed query parameters of the kline source
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Endpoint URL
    pub url: String,
    /// Extra query parameters sent verbatim with every request
    pub params: BTreeMap<String, String>,
    /// Zone the source reports `tick_at` in
    pub utc_offset: FixedOffset,
}

impl RequestInfo {
    /// Request info with no extra parameters and UTC timestamps
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: BTreeMap::new(),
            utc_offset: Utc.fix(),
        }
    }

    /// Replace the extra query parameters
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Set the zone of `tick_at` timestamps
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

/// Number of ticks to request for `range`
pub fn tick_count(range: &DateRange) -> i64 {
    range.days().clamp(0, MAX_TICK_COUNT)
}

/// Kline fetcher over HTTP
pub struct HttpTickFetcher {
    client: Client,
    request: RequestInfo,
    agents: Arc<UserAgentPool>,
}

impl HttpTickFetcher {
    /// Create a fetcher on the shared client and identity pool
    pub fn new(request: RequestInfo) -> Self {
        Self {
            client: global_http_client(),
            request,
            agents: UserAgentPool::shared(),
        }
    }

    /// Use a specific client (tests, custom proxies)
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Use a specific identity pool
    pub fn with_user_agents(mut self, agents: Arc<UserAgentPool>) -> Self {
        self.agents = agents;
        self
    }

    /// Query parameters for one call, configured params first
    fn query(&self, instrument: &str, range: &DateRange) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .request
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "prod_code" && k.as_str() != "tick_count")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.push(("prod_code".to_string(), instrument.to_string()));
        query.push(("tick_count".to_string(), tick_count(range).to_string()));
        query
    }
}

#[async_trait::async_trait]
impl TickFetcher for HttpTickFetcher {
    async fn fetch_ticks(&self, instrument: &str, range: &DateRange) -> FetcherResult<RecordBatch> {
        let query = self.query(instrument, range);
        debug!(url = %self.request.url, instrument, params = query.len(), "Requesting klines");

        let response = self
            .client
            .get(&self.request.url)
            .header(USER_AGENT, self.agents.random())
            .query(&query)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(FetcherError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))?;

        let batch = TickParser::parse_kline(&body, instrument, self.request.utc_offset, range)?;
        debug!(instrument, rows = batch.len(), "Parsed klines");
        Ok(batch)
    }

    fn endpoint(&self) -> &str {
        &self.request.url
    }
}
