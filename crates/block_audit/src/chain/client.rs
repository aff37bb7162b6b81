//! Ledger RPC client. One request per call; retry policy belongs to the caller.

use crate::chain::record::{BlockRecord, BlockSelector};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8888/v1/chain/get_block";
const REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport, status, timeout and decode failures all land here; a missing
    /// block and a dead node look the same to callers.
    #[error("block {selector} unavailable: {reason}")]
    UnavailableBlock { selector: String, reason: String },
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("build client: {0}")]
    Build(#[from] reqwest::Error),
}

impl ClientError {
    pub fn unavailable(selector: &BlockSelector, reason: impl ToString) -> Self {
        ClientError::UnavailableBlock {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Anything that can hand out blocks by selector.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch(&self, selector: BlockSelector) -> Result<BlockRecord, ClientError>;
}

/// HTTP client for a `get_block` style endpoint.
pub struct RemoteLedgerClient {
    endpoint: url::Url,
    client: reqwest::Client,
    request_count: AtomicU64,
}

impl RemoteLedgerClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint = url::Url::parse(config.endpoint.trim())?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            endpoint,
            client,
            request_count: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlockSource for RemoteLedgerClient {
    async fn fetch(&self, selector: BlockSelector) -> Result<BlockRecord, ClientError> {
        let body = serde_json::json!({ "block_num_or_id": selector.to_json() });
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let res = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::unavailable(&selector, e))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ClientError::unavailable(&selector, e))?;
        if !status.is_success() {
            return Err(ClientError::unavailable(
                &selector,
                format!("status {} body {}", status.as_u16(), text),
            ));
        }
        debug!(%selector, bytes = text.len(), "get_block");
        BlockRecord::from_json_str(&text).map_err(|e| ClientError::unavailable(&selector, e))
    }
}

/// Probe the endpoint with a block that is known to exist.
pub async fn validate_endpoint<S>(source: &S, probe_block: u64) -> Result<BlockRecord, ClientError>
where
    S: BlockSource + ?Sized,
{
    source.fetch(BlockSelector::Number(probe_block)).await
}
