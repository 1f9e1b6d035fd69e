/// Interprets `cast`-style chain commands against a JSON-RPC endpoint.
///
/// The command set is closed: anything outside it is reported as
/// unrecognized rather than as an execution failure, so callers can tell
/// "I don't know that command" apart from "that command failed".

use alloy_primitives::{Bytes, U256};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::abi::{decode_output, encode_call};
use super::coerce::{coerce_args, parse_address, parse_uint};
use super::command::CommandArgs;
use super::error::{ChainError, ChainResult};
use super::hash::{keccak_hex, selector_hex};
use super::rpc::{parse_quantity, quantity_to_decimal, to_quantity, RpcClient, RpcReply};
use super::signature::Signature;
use super::tx::Eip1559Tx;
use super::units::{format_units, parse_units, unit_decimals, ETHER_DECIMALS};
use super::wallet::{EvmWallet, TransactionSigner};
use crate::config::ChainConfig;

const DEFAULT_PRIORITY_FEE_WEI: u64 = 1_000_000_000;

/// Result of interpreting one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    Output(String),
    /// The node answered with a JSON-RPC error object
    NodeError(String),
    Unrecognized(String),
}

/// Render an interpreter result as the text handed back to the caller
pub fn render(result: ChainResult<CastOutcome>) -> String {
    match result {
        Ok(CastOutcome::Output(text)) => text,
        Ok(CastOutcome::NodeError(message)) => format!("Error: {}", message),
        Ok(CastOutcome::Unrecognized(subcommand)) => {
            format!("Error: unrecognized cast subcommand: {}", subcommand)
        }
        Err(e) => format!("Error: {}", e),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFields {
    base_fee_per_gas: Option<String>,
    gas_limit: Option<String>,
    gas_used: Option<String>,
    hash: Option<String>,
    number: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxFields {
    block_number: Option<String>,
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    gas: Option<String>,
    input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptFields {
    block_number: Option<String>,
    transaction_hash: Option<String>,
    status: Option<String>,
    gas_used: Option<String>,
    #[serde(default)]
    logs: Vec<Value>,
}

impl ReceiptFields {
    fn status_flag(&self) -> &'static str {
        match self.status.as_deref().and_then(parse_quantity) {
            Some(status) if status == U256::from(1u64) => "1",
            _ => "0",
        }
    }
}

pub struct ChainInterpreter {
    http: Client,
    config: ChainConfig,
    signer: TransactionSigner,
}

impl ChainInterpreter {
    pub fn new(config: ChainConfig) -> ChainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            signer: TransactionSigner::new(),
        })
    }

    /// Run one tokenized command line
    pub async fn execute(&self, tokens: &[String]) -> ChainResult<CastOutcome> {
        let args = CommandArgs::new(tokens);
        let subcommand = args.subcommand().unwrap_or_default();

        let output = match subcommand {
            "call" => self.call(&args).await?,
            "send" => self.send(&args).await?,
            "balance" => self.balance(&args).await?,
            "block-number" => self.rpc(&args)?.block_number().await?.to_string(),
            "block" => self.block(&args).await?,
            "chain-id" => self.rpc(&args)?.chain_id().await?.to_string(),
            "storage" => self.storage(&args).await?,
            "code" => self.code(&args).await?,
            "tx" => self.transaction(&args).await?,
            "receipt" => self.receipt(&args).await?,
            "logs" => return self.logs(&args).await,
            "rpc" => return self.raw_rpc(&args).await,
            "max-uint" => U256::MAX.to_string(),
            "--to-wei" => {
                let amount = args.require(1, "amount")?;
                parse_units(amount, unit_decimals(args.arg(2)))?.to_string()
            }
            "--from-wei" => {
                let amount = parse_uint(args.require(1, "amount")?)?;
                format_units(amount, unit_decimals(args.arg(2)))
            }
            "--to-hex" => format!("0x{:x}", parse_uint(args.require(1, "number")?)?),
            "--to-dec" => {
                let text = args.require(1, "hex")?;
                parse_quantity(text)
                    .ok_or_else(|| ChainError::invalid("hex", text))?
                    .to_string()
            }
            "abi-encode" => {
                let sig = Signature::parse(args.require(1, "signature")?)?;
                let values = coerce_args(&sig.inputs, &args.positional(2))?;
                hex_data(&encode_call(&sig, &values)?)
            }
            "sig" => selector_hex(args.arg(1).unwrap_or_default()),
            "keccak" | "keccak256" => keccak_hex(args.arg(1).unwrap_or_default()),
            other => return Ok(CastOutcome::Unrecognized(other.to_string())),
        };

        Ok(CastOutcome::Output(output))
    }

    fn rpc(&self, args: &CommandArgs<'_>) -> ChainResult<RpcClient> {
        let url = args.require_flag("--rpc-url")?;
        Ok(RpcClient::new(self.http.clone(), url))
    }

    async fn call(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let to = parse_address(args.require(1, "address")?)?;
        let sig = Signature::parse(args.require(2, "signature")?)?;
        let values = coerce_args(&sig.inputs, &args.positional(3))?;
        let data = encode_call(&sig, &values)?;

        let result: String = rpc
            .request(
                "eth_call",
                json!([{ "to": to.to_checksum(None), "data": hex_data(&data) }, "latest"]),
            )
            .await?;
        let returned = decode_hex(&result, "eth_call")?;

        Ok(decode_output(&sig, &returned))
    }

    async fn send(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let (rpc_url, private_key) = match (args.flag("--rpc-url"), args.flag("--private-key")) {
            (Some(rpc_url), Some(private_key)) => (rpc_url, private_key),
            _ => {
                return Err(ChainError::MissingFlag {
                    flag: "--rpc-url and --private-key",
                })
            }
        };
        let rpc = RpcClient::new(self.http.clone(), rpc_url);
        let wallet = EvmWallet::from_private_key_hex(private_key)?;

        let to = parse_address(args.require(1, "address")?)?;
        let sig = Signature::parse(args.require(2, "signature")?)?;
        let values = coerce_args(&sig.inputs, &args.positional(3))?;
        let data = encode_call(&sig, &values)?;
        let value = match args.flag("--value") {
            Some(wei) => parse_uint(wei)?,
            None => U256::ZERO,
        };

        let from = wallet.address().to_checksum(None);
        let to_hex = to.to_checksum(None);

        let chain_id = rpc.chain_id().await?;
        let nonce = rpc
            .request_quantity("eth_getTransactionCount", json!([from, "pending"]))
            .await?;
        let gas_limit = rpc
            .request_quantity(
                "eth_estimateGas",
                json!([{
                    "from": from,
                    "to": to_hex,
                    "data": hex_data(&data),
                    "value": format!("0x{:x}", value),
                }]),
            )
            .await?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.fees(&rpc).await?;

        let tx = Eip1559Tx {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data: Bytes::from(data),
        };
        let raw = self.signer.sign_transaction(&tx, &wallet.secret_key()?)?;

        let hash: String = rpc
            .request("eth_sendRawTransaction", json!([hex_data(&raw)]))
            .await?;
        tracing::info!("Broadcast {} from {} (nonce {})", hash, from, nonce);

        let receipt = self.wait_for_receipt(&rpc, &hash).await?;
        Ok(labelled(
            16,
            &[
                ("blockNumber", quantity_to_decimal(receipt.block_number.as_deref())),
                ("transactionHash", receipt.transaction_hash.clone().unwrap_or(hash)),
                ("status", receipt.status_flag().to_string()),
                ("gasUsed", quantity_to_decimal(receipt.gas_used.as_deref())),
            ],
        ))
    }

    /// EIP-1559 fee caps: twice the latest base fee plus the tip. Chains
    /// without a base fee fall back to the legacy gas price.
    async fn fees(&self, rpc: &RpcClient) -> ChainResult<(U256, U256)> {
        let priority = match rpc.request_quantity("eth_maxPriorityFeePerGas", json!([])).await {
            Ok(tip) => tip,
            Err(e) => {
                tracing::debug!("eth_maxPriorityFeePerGas unavailable ({}), using 1 gwei", e);
                U256::from(DEFAULT_PRIORITY_FEE_WEI)
            }
        };

        let latest: Option<BlockFields> = rpc
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = latest
            .and_then(|block| block.base_fee_per_gas)
            .and_then(|fee| parse_quantity(&fee));

        match base_fee {
            Some(base_fee) => Ok((
                base_fee.saturating_mul(U256::from(2u64)).saturating_add(priority),
                priority,
            )),
            None => {
                let gas_price = rpc.request_quantity("eth_gasPrice", json!([])).await?;
                Ok((gas_price, priority.min(gas_price)))
            }
        }
    }

    async fn wait_for_receipt(&self, rpc: &RpcClient, hash: &str) -> ChainResult<ReceiptFields> {
        let deadline = Instant::now() + Duration::from_secs(self.config.receipt_timeout_secs);
        let poll_interval = Duration::from_millis(self.config.receipt_poll_interval_ms);

        loop {
            let receipt: Option<ReceiptFields> = rpc
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(ChainError::ReceiptTimeout(hash.to_string()));
            }
            sleep(poll_interval).await;
        }
    }

    async fn balance(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let address = parse_address(args.require(1, "address")?)?;
        let wei = rpc
            .request_quantity("eth_getBalance", json!([address.to_checksum(None), "latest"]))
            .await?;

        Ok(if args.has_flag("--ether") {
            format_units(wei, ETHER_DECIMALS)
        } else {
            wei.to_string()
        })
    }

    async fn block(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let tag = match args.arg(1) {
            Some(number) if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => {
                format!("0x{:x}", parse_uint(number)?)
            }
            Some(tag) => tag.to_string(),
            None => "latest".to_string(),
        };

        let block: Option<BlockFields> = rpc
            .request("eth_getBlockByNumber", json!([tag, false]))
            .await?;
        let block = block.ok_or_else(|| ChainError::NotFound(format!("Block at {}", tag)))?;

        let base_fee = block
            .base_fee_per_gas
            .as_deref()
            .map(|fee| quantity_to_decimal(Some(fee)))
            .unwrap_or_default();

        Ok(labelled(
            21,
            &[
                ("baseFeePerGas", base_fee),
                ("gasLimit", quantity_to_decimal(block.gas_limit.as_deref())),
                ("gasUsed", quantity_to_decimal(block.gas_used.as_deref())),
                ("hash", block.hash.unwrap_or_else(|| "null".to_string())),
                ("number", quantity_to_decimal(block.number.as_deref())),
                ("timestamp", quantity_to_decimal(block.timestamp.as_deref())),
            ],
        ))
    }

    async fn storage(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let address = parse_address(args.require(1, "address")?)?;
        let slot = args.require(2, "slot")?;
        let slot = if slot.starts_with("0x") {
            slot.to_string()
        } else {
            format!("0x{:x}", parse_uint(slot)?)
        };

        let value: Option<String> = rpc
            .request(
                "eth_getStorageAt",
                json!([address.to_checksum(None), slot, "latest"]),
            )
            .await?;
        Ok(value
            .filter(|v| !v.is_empty() && v != "0x")
            .unwrap_or_else(|| "0x0".to_string()))
    }

    async fn code(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let address = parse_address(args.require(1, "address")?)?;
        let code: Option<String> = rpc
            .request("eth_getCode", json!([address.to_checksum(None), "latest"]))
            .await?;
        Ok(code
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "0x".to_string()))
    }

    async fn transaction(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let hash = args.require(1, "transaction hash")?;
        let tx: Option<TxFields> = rpc
            .request("eth_getTransactionByHash", json!([hash]))
            .await?;
        let tx = tx.ok_or_else(|| ChainError::NotFound(format!("Transaction with hash \"{}\"", hash)))?;

        let null = || "null".to_string();
        Ok(labelled(
            16,
            &[
                ("blockNumber", quantity_to_decimal(tx.block_number.as_deref())),
                ("from", tx.from.unwrap_or_else(null)),
                ("to", tx.to.unwrap_or_else(null)),
                ("value", quantity_to_decimal(tx.value.as_deref())),
                ("gas", quantity_to_decimal(tx.gas.as_deref())),
                ("input", tx.input.unwrap_or_else(null)),
            ],
        ))
    }

    async fn receipt(&self, args: &CommandArgs<'_>) -> ChainResult<String> {
        let rpc = self.rpc(args)?;
        let hash = args.require(1, "transaction hash")?;
        let receipt: Option<ReceiptFields> = rpc
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        let receipt = receipt.ok_or_else(|| {
            ChainError::NotFound(format!("Transaction receipt with hash \"{}\"", hash))
        })?;

        Ok(labelled(
            16,
            &[
                ("blockNumber", quantity_to_decimal(receipt.block_number.as_deref())),
                (
                    "transactionHash",
                    receipt.transaction_hash.clone().unwrap_or_else(|| hash.to_string()),
                ),
                ("status", receipt.status_flag().to_string()),
                ("gasUsed", quantity_to_decimal(receipt.gas_used.as_deref())),
                ("logs", receipt.logs.len().to_string()),
            ],
        ))
    }

    async fn logs(&self, args: &CommandArgs<'_>) -> ChainResult<CastOutcome> {
        let rpc = self.rpc(args)?;
        let from_block = args.flag("--from-block").and_then(parse_block_number);
        let to_block = match args.flag("--to-block").and_then(parse_block_number) {
            Some(number) => number,
            None => {
                let head = rpc.block_number().await?;
                u64::try_from(head).map_err(|_| ChainError::Response {
                    method: "eth_blockNumber".to_string(),
                    detail: format!("block number {} out of range", head),
                })?
            }
        };
        let (from, to) = clamp_block_range(from_block, to_block, self.config.max_log_range);

        let mut filter = Map::new();
        if let Some(address) = args.flag("--address") {
            filter.insert("address".to_string(), json!(address));
        }
        if let Some(topic0) = args.flag("--topic0") {
            filter.insert("topics".to_string(), json!([topic0]));
        }
        filter.insert("fromBlock".to_string(), json!(to_quantity(from)));
        filter.insert("toBlock".to_string(), json!(to_quantity(to)));

        let logs = match rpc.call_raw("eth_getLogs", json!([Value::Object(filter)])).await? {
            RpcReply::Error { message, .. } => return Ok(CastOutcome::NodeError(message)),
            RpcReply::Result(value) => value.as_array().cloned().unwrap_or_default(),
        };
        if logs.is_empty() {
            return Ok(CastOutcome::Output(format!(
                "No logs found (searched blocks {} to {})",
                from, to
            )));
        }

        Ok(CastOutcome::Output(
            logs.iter().map(format_log).collect::<Vec<_>>().join("\n"),
        ))
    }

    async fn raw_rpc(&self, args: &CommandArgs<'_>) -> ChainResult<CastOutcome> {
        let rpc = self.rpc(args)?;
        let method = args.require(1, "method")?;
        let params: Vec<Value> = args
            .positional(2)
            .into_iter()
            .map(|p| serde_json::from_str(&p).unwrap_or(Value::String(p)))
            .collect();

        match rpc.call_raw(method, Value::Array(params)).await? {
            RpcReply::Error { message, .. } => Ok(CastOutcome::NodeError(message)),
            RpcReply::Result(Value::String(text)) => Ok(CastOutcome::Output(text)),
            RpcReply::Result(other) => serde_json::to_string_pretty(&other)
                .map(CastOutcome::Output)
                .map_err(|e| ChainError::Response {
                    method: method.to_string(),
                    detail: e.to_string(),
                }),
        }
    }
}

/// Keep `to` fixed and pull `from` forward so the span never exceeds
/// `max_range` blocks
pub fn clamp_block_range(from: Option<u64>, to: u64, max_range: u64) -> (u64, u64) {
    let from = from.unwrap_or(0);
    if to.saturating_sub(from) > max_range {
        (to - max_range, to)
    } else {
        (from, to)
    }
}

fn parse_block_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn format_log(log: &Value) -> String {
    let text = |key: &str| log.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let block_number = log
        .get("blockNumber")
        .and_then(Value::as_str)
        .map(|n| quantity_to_decimal(Some(n)))
        .unwrap_or_default();
    let topics = log
        .get("topics")
        .map(Value::to_string)
        .unwrap_or_else(|| "[]".to_string());

    let mut entry = labelled(
        17,
        &[
            ("address", text("address")),
            ("blockNumber", block_number),
            ("transactionHash", text("transactionHash")),
            ("topics", topics),
            ("data", text("data")),
        ],
    );
    entry.push('\n');
    entry
}

/// Left-aligned `label value` rows
fn labelled(width: usize, rows: &[(&str, String)]) -> String {
    rows.iter()
        .map(|(label, value)| format!("{:<width$}{}", label, value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(text: &str, method: &str) -> ChainResult<Vec<u8>> {
    let body = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(body).map_err(|e| ChainError::Response {
        method: method.to_string(),
        detail: format!("invalid hex data: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> ChainInterpreter {
        ChainInterpreter::new(ChainConfig::default()).unwrap()
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn run(items: &[&str]) -> String {
        render(interpreter().execute(&tokens(items)).await)
    }

    #[tokio::test]
    async fn test_offline_conversions() {
        assert_eq!(
            run(&["max-uint"]).await,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(run(&["--to-wei", "1.5"]).await, "1500000000000000000");
        assert_eq!(run(&["--to-wei", "2", "gwei"]).await, "2000000000");
        assert_eq!(run(&["--from-wei", "1500000000000000000"]).await, "1.5");
        assert_eq!(run(&["--from-wei", "2500000000", "gwei"]).await, "2.5");
        assert_eq!(run(&["--to-hex", "255"]).await, "0xff");
        assert_eq!(run(&["--to-dec", "0xff"]).await, "255");
    }

    #[tokio::test]
    async fn test_hashing_commands() {
        assert_eq!(run(&["sig", "transfer(address,uint256)"]).await, "0xa9059cbb");
        assert_eq!(
            run(&["keccak", ""]).await,
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(run(&["keccak256", ""]).await, run(&["keccak", ""]).await);
    }

    #[tokio::test]
    async fn test_abi_encode_command() {
        let out = run(&[
            "abi-encode",
            "transfer(address,uint256)",
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "1",
        ])
        .await;
        assert_eq!(
            out,
            format!(
                "0xa9059cbb000000000000000000000000f39fd6e51aad88f6f4ce6ab8827279cfffb92266{:064x}",
                1
            )
        );
    }

    #[tokio::test]
    async fn test_unrecognized_is_distinct_from_failure() {
        let outcome = interpreter().execute(&tokens(&["frobnicate", "x"])).await.unwrap();
        assert_eq!(outcome, CastOutcome::Unrecognized("frobnicate".to_string()));
        assert_eq!(
            render(Ok(outcome)),
            "Error: unrecognized cast subcommand: frobnicate"
        );
        assert_eq!(
            render(Ok(CastOutcome::NodeError("execution reverted".into()))),
            "Error: execution reverted"
        );
    }

    #[tokio::test]
    async fn test_missing_flags_are_user_errors() {
        assert_eq!(run(&["block-number"]).await, "Error: --rpc-url required");
        assert_eq!(
            run(&["call", "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", "f()"]).await,
            "Error: --rpc-url required"
        );
        assert_eq!(
            run(&["send", "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", "f()", "--rpc-url", "http://x"]).await,
            "Error: --rpc-url and --private-key required"
        );
    }

    #[tokio::test]
    async fn test_malformed_input_is_reported() {
        let out = run(&["abi-encode", "not a signature"]).await;
        assert!(out.starts_with("Error: cannot parse signature"));

        let out = run(&["call", "0x1234", "f()", "--rpc-url", "http://127.0.0.1:1"]).await;
        assert_eq!(out, "Error: Address \"0x1234\" is invalid.");
    }

    #[test]
    fn test_clamp_block_range() {
        assert_eq!(clamp_block_range(None, 100_000, 9999), (90_001, 100_000));
        assert_eq!(clamp_block_range(Some(95_000), 100_000, 9999), (95_000, 100_000));
        assert_eq!(clamp_block_range(Some(0), 9_999, 9999), (0, 9_999));
        // inverted ranges are passed through untouched
        assert_eq!(clamp_block_range(Some(500), 100, 9999), (500, 100));
    }

    #[test]
    fn test_labelled_rows() {
        let out = labelled(16, &[("status", "1".to_string()), ("gasUsed", "21000".to_string())]);
        assert_eq!(out, "status          1\ngasUsed         21000");
    }

    #[test]
    fn test_format_log_entry() {
        let log = json!({
            "address": "0xabc",
            "blockNumber": "0x10",
            "transactionHash": "0xdead",
            "topics": ["0x01", "0x02"],
            "data": "0x"
        });
        assert_eq!(
            format_log(&log),
            "address          0xabc\n\
             blockNumber      16\n\
             transactionHash  0xdead\n\
             topics           [\"0x01\",\"0x02\"]\n\
             data             0x\n"
        );
    }
}
