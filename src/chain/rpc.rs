/// Minimal JSON-RPC 2.0 client for EVM nodes
use alloy_primitives::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{ChainError, ChainResult};

#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

/// Outcome of a raw call where the node's error object is data, not a failure
#[derive(Debug, Clone)]
pub enum RpcReply {
    Result(Value),
    Error { code: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl RpcClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request and return either the `result` or the node's `error`
    pub async fn call_raw(&self, method: &str, params: Value) -> ChainResult<RpcReply> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::debug!("rpc {} -> {}", method, self.url);
        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let parsed: RpcErrorObject =
                serde_json::from_value(error.clone()).unwrap_or(RpcErrorObject {
                    code: 0,
                    message: String::new(),
                });
            let message = if parsed.message.is_empty() {
                error.to_string()
            } else {
                parsed.message
            };
            return Ok(RpcReply::Error {
                code: parsed.code,
                message,
            });
        }

        Ok(RpcReply::Result(
            response.get("result").cloned().unwrap_or(Value::Null),
        ))
    }

    /// Typed call; a node error becomes `ChainError::Rpc`
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        match self.call_raw(method, params).await? {
            RpcReply::Result(value) => {
                serde_json::from_value(value).map_err(|e| ChainError::Response {
                    method: method.to_string(),
                    detail: e.to_string(),
                })
            }
            RpcReply::Error { code, message } => Err(ChainError::Rpc { code, message }),
        }
    }

    /// Call returning a hex quantity
    pub async fn request_quantity(&self, method: &str, params: Value) -> ChainResult<U256> {
        let raw: String = self.request(method, params).await?;
        parse_quantity(&raw).ok_or_else(|| ChainError::Response {
            method: method.to_string(),
            detail: format!("not a hex quantity: {}", raw),
        })
    }

    pub async fn block_number(&self) -> ChainResult<U256> {
        self.request_quantity("eth_blockNumber", json!([])).await
    }

    pub async fn chain_id(&self) -> ChainResult<U256> {
        self.request_quantity("eth_chainId", json!([])).await
    }
}

/// Parse a JSON-RPC quantity (`0x1a`) into an integer
pub fn parse_quantity(raw: &str) -> Option<U256> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Decimal rendering of an optional hex quantity field; missing or
/// malformed values render as-is so output stays informative
pub fn quantity_to_decimal(raw: Option<&str>) -> String {
    match raw {
        Some(text) => parse_quantity(text)
            .map(|v| v.to_string())
            .unwrap_or_else(|| text.to_string()),
        None => "null".to_string(),
    }
}

/// Hex quantity for request params
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
