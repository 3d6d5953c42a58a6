//! JSON-RPC 2.0 ledger client over HTTP.
//!
//! The ledger endpoint exposes four methods: `ledger.pushChunk`,
//! `ledger.getLatestIndex`, `ledger.getChunk` and
//! `ledger.getWriterSequence`. Payload bytes travel base64-encoded. The
//! endpoint reports stale-sequence and oversize rejections with dedicated
//! error codes so callers can tell them apart from transport failures.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chunk::{ChunkRecord, CommitReceipt};
use crate::client::LedgerClient;
use crate::error::{LedgerError, Result};

/// Ledger error codes, alongside the standard JSON-RPC range.
pub const ERR_STALE_SEQUENCE: i32 = -32001;
pub const ERR_CHUNK_TOO_LARGE: i32 = -32002;
pub const ERR_NOT_FOUND: i32 = -32004;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Credentials and addressing for a ledger endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerCredentials {
    pub rpc_url: String,
    /// Writer credential presented as a bearer token.
    pub access_key: String,
    /// Stream identity this writer appends to.
    pub stream: String,
}

impl LedgerCredentials {
    /// Load credentials from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let creds: LedgerCredentials = serde_json::from_str(&content)?;
        Ok(creds)
    }

    /// Save credentials to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// HTTP JSON-RPC ledger client.
pub struct RpcLedgerClient {
    client: reqwest::Client,
    rpc_url: String,
    access_key: String,
    stream: String,
    request_id: AtomicI64,
}

impl RpcLedgerClient {
    pub fn new(creds: &LedgerCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: creds.rpc_url.trim_end_matches('/').to_string(),
            access_key: creds.access_key.clone(),
            stream: creds.stream.clone(),
            request_id: AtomicI64::new(1),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        };

        let res = self
            .client
            .post(&self.rpc_url)
            .header("Authorization", format!("Bearer {}", self.access_key))
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("HTTP {}", status)));
        }

        let response: RpcResponse = res.json().await?;
        if let Some(error) = response.error {
            return Err(map_rpc_error(error));
        }
        response
            .result
            .ok_or_else(|| LedgerError::Rejected("response carried no result".to_string()))
    }
}

/// Map a ledger error object onto the distinguishable error taxonomy.
fn map_rpc_error(error: RpcErrorObject) -> LedgerError {
    match error.code {
        ERR_STALE_SEQUENCE => {
            let expected = error
                .data
                .as_ref()
                .and_then(|d| d.get("expected"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let got = error
                .data
                .as_ref()
                .and_then(|d| d.get("got"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            LedgerError::StaleSequence { expected, got }
        }
        ERR_CHUNK_TOO_LARGE => {
            let size = error
                .data
                .as_ref()
                .and_then(|d| d.get("size"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            LedgerError::ChunkTooLarge {
                size,
                max: crate::MAX_CHUNK_BYTES,
            }
        }
        ERR_NOT_FOUND => {
            let index = error
                .data
                .as_ref()
                .and_then(|d| d.get("index"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            LedgerError::NotFound(index)
        }
        _ => LedgerError::Rejected(error.message),
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn append(&self, sequence: u64, payload: &[u8]) -> Result<CommitReceipt> {
        let data = general_purpose::STANDARD.encode(payload);
        let result = self
            .request(
                "ledger.pushChunk",
                json!({
                    "stream": self.stream,
                    "sequence": sequence,
                    "data": data,
                }),
            )
            .await?;

        let index = result
            .get("index")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| LedgerError::Rejected("append response missing index".to_string()))?;
        let confirmation = result
            .get("confirmation")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(CommitReceipt {
            index,
            size: payload.len(),
            confirmation,
        })
    }

    async fn latest_index(&self) -> Result<u64> {
        let result = self
            .request("ledger.getLatestIndex", json!({ "stream": self.stream }))
            .await?;
        result
            .as_u64()
            .ok_or_else(|| LedgerError::Rejected("latest index is not a number".to_string()))
    }

    async fn read_at(&self, index: u64) -> Result<ChunkRecord> {
        let result = self
            .request(
                "ledger.getChunk",
                json!({ "stream": self.stream, "index": index }),
            )
            .await?;

        let submitted_at = result
            .get("submitted_at")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or(LedgerError::NotFound(index))?;
        let payload = general_purpose::STANDARD
            .decode(data)
            .map_err(|e| LedgerError::Rejected(format!("invalid chunk encoding: {}", e)))?;

        Ok(ChunkRecord {
            index,
            submitted_at,
            payload,
        })
    }

    async fn writer_sequence(&self) -> Result<u64> {
        let result = self
            .request(
                "ledger.getWriterSequence",
                json!({ "stream": self.stream }),
            )
            .await?;
        result
            .as_u64()
            .ok_or_else(|| LedgerError::Rejected("writer sequence is not a number".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_sequence_code_maps_to_stale_sequence() {
        let error = RpcErrorObject {
            code: ERR_STALE_SEQUENCE,
            message: "stale".to_string(),
            data: Some(json!({ "expected": 9, "got": 7 })),
        };
        match map_rpc_error(error) {
            LedgerError::StaleSequence { expected, got } => {
                assert_eq!(expected, 9);
                assert_eq!(got, 7);
            }
            other => panic!("expected StaleSequence, got {:?}", other),
        }
    }

    #[test]
    fn oversize_code_maps_to_chunk_too_large() {
        let error = RpcErrorObject {
            code: ERR_CHUNK_TOO_LARGE,
            message: "too large".to_string(),
            data: Some(json!({ "size": 300 * 1024 })),
        };
        assert!(matches!(
            map_rpc_error(error),
            LedgerError::ChunkTooLarge { size, .. } if size == 300 * 1024
        ));
    }

    #[test]
    fn unknown_code_maps_to_rejected() {
        let error = RpcErrorObject {
            code: -32603,
            message: "internal".to_string(),
            data: None,
        };
        assert!(matches!(map_rpc_error(error), LedgerError::Rejected(m) if m == "internal"));
    }

    #[test]
    fn credentials_round_trip_through_json() {
        let creds = LedgerCredentials {
            rpc_url: "https://ledger.example/rpc".to_string(),
            access_key: "k".to_string(),
            stream: "TestStream".to_string(),
        };
        let text = serde_json::to_string(&creds).unwrap();
        let back: LedgerCredentials = serde_json::from_str(&text).unwrap();
        assert_eq!(back.rpc_url, creds.rpc_url);
        assert_eq!(back.stream, creds.stream);
    }
}
