use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::MonitorError;

pub const QUERY_TRANSACTION_BLOCKS: &str = "suix_queryTransactionBlocks";

/// Watchers only need the newest incoming transaction per poll.
pub const POLL_PAGE_SIZE: u32 = 1;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: T,
}

impl<T> JsonRpcRequest<T> {
    pub fn new(id: u64, method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Positional params: `[query, cursor, limit, descending]`.
pub type QueryTransactionBlocksParams = (TransactionBlockQuery, Option<String>, u32, bool);

#[derive(Debug, Serialize)]
pub struct TransactionBlockQuery {
    pub filter: TransactionFilter,
    pub options: TransactionBlockOptions,
}

#[derive(Debug, Serialize)]
pub enum TransactionFilter {
    ToAddress(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockOptions {
    pub show_events: bool,
}

/// Builds the newest-first, single-entry query for transactions sent to
/// `address`.
pub fn latest_incoming_params(address: &str) -> QueryTransactionBlocksParams {
    (
        TransactionBlockQuery {
            filter: TransactionFilter::ToAddress(address.to_string()),
            options: TransactionBlockOptions { show_events: true },
        },
        None,
        POLL_PAGE_SIZE,
        true,
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    #[serde(default)]
    pub data: Vec<TransactionBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlock {
    pub digest: String,
    /// Milliseconds since the epoch, encoded as a decimal string upstream.
    #[serde(default)]
    pub timestamp_ms: Option<String>,
}

impl TransactionBlock {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = self.timestamp_ms.as_deref()?.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }
}

/// Decodes a `suix_queryTransactionBlocks` response body. A JSON-RPC error
/// object, a missing result or an entry without a digest is a failed poll.
pub fn decode_page(body: &[u8]) -> Result<TransactionPage, MonitorError> {
    let response: JsonRpcResponse<TransactionPage> =
        serde_json::from_slice(body).map_err(|err| MonitorError::Malformed(err.to_string()))?;

    if let Some(error) = response.error {
        return Err(MonitorError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    let page = response
        .result
        .ok_or_else(|| MonitorError::Malformed("response carries no result".into()))?;

    if page.data.iter().any(|block| block.digest.trim().is_empty()) {
        return Err(MonitorError::Malformed(
            "transaction entry with empty digest".into(),
        ));
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_matches_query_transaction_blocks_shape() {
        let request = JsonRpcRequest::new(
            7,
            QUERY_TRANSACTION_BLOCKS,
            latest_incoming_params("0xabc"),
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "suix_queryTransactionBlocks",
                "params": [
                    {"filter": {"ToAddress": "0xabc"}, "options": {"showEvents": true}},
                    null,
                    1,
                    true
                ]
            })
        );
    }

    #[test]
    fn decodes_page_and_ignores_extra_fields() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "data": [
                    {"digest": "d2", "timestampMs": "2000", "checkpoint": "99", "events": []},
                    {"digest": "d1", "timestampMs": "1000"}
                ],
                "nextCursor": "d1",
                "hasNextPage": true
            }
        });

        let page = decode_page(body.to_string().as_bytes()).expect("page decodes");
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].digest, "d2");
        assert_eq!(
            page.data[0].timestamp(),
            DateTime::from_timestamp_millis(2_000)
        );
    }

    #[test]
    fn empty_result_is_a_valid_page() {
        let body = br#"{"jsonrpc":"2.0","id":2,"result":{"data":[],"nextCursor":null,"hasNextPage":false}}"#;
        let page = decode_page(body).expect("page decodes");
        assert!(page.data.is_empty());
    }

    #[test]
    fn rpc_error_object_is_a_failure() {
        let body = br#"{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"Invalid params"}}"#;
        let err = decode_page(body).unwrap_err();
        assert!(matches!(err, MonitorError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn malformed_payloads_are_failures() {
        assert!(matches!(
            decode_page(b"<html>bad gateway</html>").unwrap_err(),
            MonitorError::Malformed(_)
        ));
        assert!(matches!(
            decode_page(br#"{"jsonrpc":"2.0","id":2}"#).unwrap_err(),
            MonitorError::Malformed(_)
        ));
        assert!(matches!(
            decode_page(br#"{"result":{"data":[{"timestampMs":"1"}]}}"#).unwrap_err(),
            MonitorError::Malformed(_)
        ));
    }

    #[test]
    fn unparsable_timestamp_yields_none() {
        let block = TransactionBlock {
            digest: "d1".into(),
            timestamp_ms: Some("soon".into()),
        };
        assert_eq!(block.timestamp(), None);
    }
}
