use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::worker::MonitorError;

mod types;

pub use types::{
    decode_page, latest_incoming_params, JsonRpcRequest, TransactionBlock, TransactionPage,
    POLL_PAGE_SIZE, QUERY_TRANSACTION_BLOCKS,
};

/// Upstream query used by watchers. Implementations must bound the call
/// with a finite timeout.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Returns the newest transactions sent to `address`, newest first.
    async fn latest_incoming(&self, address: &str) -> Result<TransactionPage, MonitorError>;
}

/// Sui full-node JSON-RPC client.
pub struct RpcTransactionSource {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcTransactionSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MonitorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl TransactionSource for RpcTransactionSource {
    async fn latest_incoming(&self, address: &str) -> Result<TransactionPage, MonitorError> {
        let request = JsonRpcRequest::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            QUERY_TRANSACTION_BLOCKS,
            latest_incoming_params(address),
        );

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(MonitorError::UpstreamStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        decode_page(&body)
    }
}
