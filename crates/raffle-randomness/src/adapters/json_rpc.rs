//! EVM JSON-RPC Chain Adapter
//!
//! Talks to the VRF consumer contract and the fee token over plain
//! JSON-RPC. Raffles are keyed on chain by `keccak256(raffle_id)`.
//!
//! Consumer ABI (the consumer forwards the oracle parameters to the VRF
//! coordinator's `requestRandomWords`):
//! - `requestRandomness(bytes32 raffleKey, uint256 range, bytes32 keyHash, uint64 subId, uint16 confirmations, uint32 gasLimit)`
//! - `requestCrossChainRandomness(bytes32 raffleKey, uint256 range, bytes32 sourceChain, bytes32 keyHash, uint64 subId, uint16 confirmations, uint32 gasLimit)`
//! - `raffleRequestId(bytes32 raffleKey) -> uint256`
//! - `getRequest(uint256 requestId) -> (bool fulfilled, uint256 value, bytes32 sourceChain)`
//!
//! VRF coordinator ABI:
//! - `getSubscription(uint64 subId) -> (uint96 balance, uint64 reqCount, address owner, address[] consumers)`

use crate::domain::{
    ChainError, ChainId, DrawOptions, OracleRequestParams, OracleStatus, RaffleId, TokenBalance,
    TxMetadata, TxRef,
};
use crate::ports::outbound::ChainAdapter;
use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const WORD: usize = 32;

/// Contract endpoints for one EVM chain.
#[derive(Clone, Debug)]
pub struct JsonRpcEndpoint {
    /// Chain served.
    pub chain: ChainId,
    /// Node URL.
    pub rpc_url: String,
    /// VRF consumer contract.
    pub consumer_address: String,
    /// ERC-20 fee token.
    pub fee_token_address: String,
    /// Account that signs draw submissions (unlocked on the node).
    pub operator_address: String,
    /// HTTP timeout per request.
    pub http_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC adapter for an EVM settlement chain.
pub struct JsonRpcChainAdapter {
    endpoint: JsonRpcEndpoint,
    http_client: reqwest::Client,
    request_id: AtomicU64,
}

impl JsonRpcChainAdapter {
    /// Build an adapter. Fails for chains that do not speak EVM JSON-RPC.
    pub fn new(endpoint: JsonRpcEndpoint) -> Result<Self, ChainError> {
        if !endpoint.chain.is_evm() {
            return Err(ChainError::UnsupportedChain(endpoint.chain.to_string()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(endpoint.http_timeout)
            .build()
            .map_err(|e| ChainError::Rpc(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            http_client,
            request_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = self
            .http_client
            .post(&self.endpoint.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method}: {e}")))?;

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Decode(format!("{method}: {e}")))?;

        if let Some(error) = rpc_response.error {
            return Err(classify_rpc_error(error));
        }
        rpc_response
            .result
            .ok_or_else(|| ChainError::Decode(format!("{method}: response missing result")))
    }

    async fn eth_call(&self, to: &str, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let result = self
            .call(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        decode_hex_bytes(as_str(&result)?)
    }

    async fn oracle_request_id(&self, raffle_id: &RaffleId) -> Result<u128, ChainError> {
        let mut data = selector("raffleRequestId(bytes32)").to_vec();
        data.extend_from_slice(&raffle_key(raffle_id));
        let out = self.eth_call(&self.endpoint.consumer_address, data).await?;
        word_to_u128(word(&out, 0)?)
    }
}

fn classify_rpc_error(error: JsonRpcError) -> ChainError {
    let message = error.message.to_ascii_lowercase();
    if message.contains("already fulfilled") {
        ChainError::AlreadyFulfilled
    } else if message.contains("already requested") {
        ChainError::AlreadyRequested(error.message)
    } else {
        ChainError::Rpc(format!("code {}: {}", error.code, error.message))
    }
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// On-chain key for a raffle.
pub fn raffle_key(raffle_id: &RaffleId) -> [u8; 32] {
    let digest = Keccak256::digest(raffle_id.as_str().as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn encode_uint(value: u128) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

fn encode_address(address: &str) -> Result<[u8; WORD], ChainError> {
    let raw = decode_hex_bytes(address)?;
    if raw.len() != 20 {
        return Err(ChainError::Decode(format!("invalid address {address}")));
    }
    let mut out = [0u8; WORD];
    out[12..].copy_from_slice(&raw);
    Ok(out)
}

fn encode_bytes32(value: &str, what: &str) -> Result<[u8; WORD], ChainError> {
    let raw = decode_hex_bytes(value)?;
    if raw.len() != WORD {
        return Err(ChainError::Decode(format!("{what} {value} is not 32 bytes")));
    }
    let mut out = [0u8; WORD];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// Calldata for a draw submission.
fn draw_calldata(
    raffle_id: &RaffleId,
    range: u64,
    options: &DrawOptions,
    oracle: &OracleRequestParams,
) -> Result<Vec<u8>, ChainError> {
    let mut data = if options.cross_chain {
        selector("requestCrossChainRandomness(bytes32,uint256,bytes32,bytes32,uint64,uint16,uint32)")
            .to_vec()
    } else {
        selector("requestRandomness(bytes32,uint256,bytes32,uint64,uint16,uint32)").to_vec()
    };
    data.extend_from_slice(&raffle_key(raffle_id));
    data.extend_from_slice(&encode_uint(range as u128));
    if options.cross_chain {
        data.extend_from_slice(&options.source_chain.to_bytes32());
    }
    data.extend_from_slice(&encode_bytes32(&oracle.key_hash, "key hash")?);
    data.extend_from_slice(&encode_uint(oracle.subscription_id as u128));
    data.extend_from_slice(&encode_uint(oracle.request_confirmations as u128));
    data.extend_from_slice(&encode_uint(oracle.callback_gas_limit as u128));
    Ok(data)
}

fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    data.get(index * WORD..(index + 1) * WORD)
        .ok_or_else(|| ChainError::Decode(format!("return data too short for word {index}")))
}

fn word_to_u128(word: &[u8]) -> Result<u128, ChainError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("uint256 does not fit in u128".into()));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(buf))
}

fn word_to_bool(word: &[u8]) -> Result<bool, ChainError> {
    match word_to_u128(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ChainError::Decode(format!("invalid bool word {other}"))),
    }
}

/// `getSubscription` reports a non-zero owner for live subscriptions.
fn subscription_owned(out: &[u8]) -> Result<bool, ChainError> {
    Ok(word(out, 2)?.iter().any(|b| *b != 0))
}

fn decode_hex_bytes(value: &str) -> Result<Vec<u8>, ChainError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|e| ChainError::Decode(format!("invalid hex {value}: {e}")))
}

fn parse_hex_u64(value: &str) -> Result<u64, ChainError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(trimmed, 16)
        .map_err(|e| ChainError::Decode(format!("invalid quantity {value}: {e}")))
}

fn as_str(value: &Value) -> Result<&str, ChainError> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected string, got {value}")))
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a str, ChainError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Decode(format!("missing field {name}")))
}

#[async_trait]
impl ChainAdapter for JsonRpcChainAdapter {
    fn chain(&self) -> ChainId {
        self.endpoint.chain
    }

    async fn submit_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: &DrawOptions,
        oracle: &OracleRequestParams,
    ) -> Result<TxRef, ChainError> {
        let data = draw_calldata(raffle_id, range, options, oracle)?;

        let result = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": self.endpoint.operator_address,
                    "to": self.endpoint.consumer_address,
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await?;
        let tx_hash = as_str(&result)?.to_string();

        debug!(
            "[randomness] {} draw submitted for {} in {}",
            self.endpoint.chain, raffle_id, tx_hash
        );

        // The request id is only readable once the transaction is mined.
        let oracle_request_id = match self.oracle_request_id(raffle_id).await {
            Ok(0) => None,
            Ok(id) => Some(id.to_string()),
            Err(e) => {
                warn!("[randomness] could not read oracle request id for {}: {}", raffle_id, e);
                None
            }
        };

        Ok(TxRef {
            chain: self.endpoint.chain,
            tx_hash,
            oracle_request_id,
        })
    }

    async fn get_request_status(&self, raffle_id: &RaffleId) -> Result<OracleStatus, ChainError> {
        let request_id = self.oracle_request_id(raffle_id).await?;
        if request_id == 0 {
            return Err(ChainError::RequestNotFound(raffle_id.to_string()));
        }

        let mut data = selector("getRequest(uint256)").to_vec();
        data.extend_from_slice(&encode_uint(request_id));
        let out = self.eth_call(&self.endpoint.consumer_address, data).await?;

        let fulfilled = word_to_bool(word(&out, 0)?)?;
        let raw_value = word_to_u128(word(&out, 1)?)?;
        let mut chain_word = [0u8; WORD];
        chain_word.copy_from_slice(word(&out, 2)?);
        let source_chain = ChainId::from_bytes32(&chain_word).unwrap_or(self.endpoint.chain);

        let value = if fulfilled {
            Some(
                u64::try_from(raw_value)
                    .map_err(|_| ChainError::Decode(format!("value {raw_value} exceeds u64")))?,
            )
        } else {
            None
        };

        Ok(OracleStatus {
            oracle_request_id: request_id.to_string(),
            fulfilled,
            value,
            source_chain,
        })
    }

    async fn get_balance(&self, wallet: &str) -> Result<TokenBalance, ChainError> {
        let mut data = selector("balanceOf(address)").to_vec();
        data.extend_from_slice(&encode_address(wallet)?);
        let out = self.eth_call(&self.endpoint.fee_token_address, data).await?;
        let raw = word_to_u128(word(&out, 0)?)?;

        let out = self
            .eth_call(&self.endpoint.fee_token_address, selector("decimals()").to_vec())
            .await?;
        let decimals = u8::try_from(word_to_u128(word(&out, 0)?)?)
            .map_err(|_| ChainError::Decode("decimals exceeds u8".into()))?;

        Ok(TokenBalance { raw, decimals })
    }

    async fn get_tx_metadata(&self, tx_hash: &str) -> Result<TxMetadata, ChainError> {
        let receipt = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if receipt.is_null() {
            return Err(ChainError::RequestNotFound(tx_hash.to_string()));
        }
        let block_number_hex = field(&receipt, "blockNumber")?;
        let block_number = parse_hex_u64(block_number_hex)?;
        let block_hash = receipt
            .get("blockHash")
            .and_then(Value::as_str)
            .map(str::to_string);

        let block = self
            .call("eth_getBlockByNumber", json!([block_number_hex, false]))
            .await?;
        let timestamp = parse_hex_u64(field(&block, "timestamp")?)?;
        let timestamp = DateTime::from_timestamp(timestamp as i64, 0)
            .ok_or_else(|| ChainError::Decode(format!("invalid block timestamp {timestamp}")))?;

        Ok(TxMetadata {
            tx_hash: tx_hash.to_string(),
            block_number,
            block_hash,
            timestamp,
        })
    }

    async fn latest_block(&self) -> Result<u64, ChainError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(as_str(&result)?)
    }

    async fn contract_reachable(&self) -> Result<bool, ChainError> {
        let result = self
            .call(
                "eth_getCode",
                json!([self.endpoint.consumer_address, "latest"]),
            )
            .await?;
        Ok(!decode_hex_bytes(as_str(&result)?)?.is_empty())
    }

    async fn subscription_active(&self, oracle: &OracleRequestParams) -> Result<bool, ChainError> {
        encode_address(&oracle.coordinator_address)?;
        let mut data = selector("getSubscription(uint64)").to_vec();
        data.extend_from_slice(&encode_uint(oracle.subscription_id as u128));
        match self.eth_call(&oracle.coordinator_address, data).await {
            Ok(out) => subscription_owned(&out),
            // Unknown subscriptions revert.
            Err(ChainError::Rpc(message))
                if message.to_ascii_lowercase().contains("invalidsubscription") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(chain: ChainId) -> JsonRpcEndpoint {
        JsonRpcEndpoint {
            chain,
            rpc_url: "http://127.0.0.1:8545".into(),
            consumer_address: "0x0000000000000000000000000000000000000001".into(),
            fee_token_address: "0x0000000000000000000000000000000000000002".into(),
            operator_address: "0x0000000000000000000000000000000000000003".into(),
            http_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_erc20_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("decimals()")), "313ce567");
    }

    #[test]
    fn test_raffle_key_is_keccak() {
        let key = raffle_key(&RaffleId::new(""));
        assert_eq!(
            hex::encode(key),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_encode_uint_right_aligned() {
        let word = encode_uint(7);
        assert_eq!(word[31], 7);
        assert!(word[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_address() {
        let word = encode_address("0x00000000000000000000000000000000000000ff").unwrap();
        assert_eq!(word[31], 0xff);
        assert!(encode_address("0x1234").is_err());
    }

    #[test]
    fn test_decode_get_request_words() {
        let mut out = Vec::new();
        out.extend_from_slice(&encode_uint(1));
        out.extend_from_slice(&encode_uint(3));
        out.extend_from_slice(&ChainId::Solana.to_bytes32());

        assert!(word_to_bool(word(&out, 0).unwrap()).unwrap());
        assert_eq!(word_to_u128(word(&out, 1).unwrap()).unwrap(), 3);
        assert!(word(&out, 3).is_err());
    }

    #[test]
    fn test_word_to_u128_rejects_overflow() {
        let mut big = [0u8; WORD];
        big[0] = 1;
        assert!(word_to_u128(&big).is_err());
    }

    #[test]
    fn test_classify_rpc_errors() {
        let err = classify_rpc_error(JsonRpcError {
            code: 3,
            message: "execution reverted: Already fulfilled".into(),
        });
        assert_eq!(err, ChainError::AlreadyFulfilled);

        let err = classify_rpc_error(JsonRpcError {
            code: 3,
            message: "execution reverted: already requested".into(),
        });
        assert!(matches!(err, ChainError::AlreadyRequested(_)));

        let err = classify_rpc_error(JsonRpcError {
            code: -32000,
            message: "nonce too low".into(),
        });
        assert!(matches!(err, ChainError::Rpc(_)));
    }

    fn oracle() -> OracleRequestParams {
        OracleRequestParams {
            coordinator_address: "0x0000000000000000000000000000000000000004".into(),
            subscription_id: 42,
            key_hash: format!("0x{}", "ab".repeat(32)),
            callback_gas_limit: 600_000,
            request_confirmations: 5,
        }
    }

    #[test]
    fn test_draw_calldata_carries_oracle_params() {
        let raffle = RaffleId::new("raffle-1");
        let data =
            draw_calldata(&raffle, 9, &DrawOptions::on_chain(ChainId::Polygon), &oracle()).unwrap();
        let args = &data[4..];

        assert_eq!(
            data[..4],
            selector("requestRandomness(bytes32,uint256,bytes32,uint64,uint16,uint32)")
        );
        assert_eq!(args.len(), 6 * WORD);
        assert_eq!(word(args, 0).unwrap(), raffle_key(&raffle));
        assert_eq!(word_to_u128(word(args, 1).unwrap()).unwrap(), 9);
        assert!(word(args, 2).unwrap().iter().all(|b| *b == 0xab));
        assert_eq!(word_to_u128(word(args, 3).unwrap()).unwrap(), 42);
        assert_eq!(word_to_u128(word(args, 4).unwrap()).unwrap(), 5);
        assert_eq!(word_to_u128(word(args, 5).unwrap()).unwrap(), 600_000);
    }

    #[test]
    fn test_cross_chain_calldata_inserts_source_chain() {
        let raffle = RaffleId::new("raffle-1");
        let data = draw_calldata(&raffle, 9, &DrawOptions::cross_chain(ChainId::Solana), &oracle())
            .unwrap();
        let args = &data[4..];
        assert_eq!(args.len(), 7 * WORD);
        assert_eq!(word(args, 2).unwrap(), ChainId::Solana.to_bytes32());
        assert_eq!(word_to_u128(word(args, 4).unwrap()).unwrap(), 42);
    }

    #[test]
    fn test_draw_calldata_rejects_bad_key_hash() {
        let bad = OracleRequestParams {
            key_hash: "0xkey".into(),
            ..oracle()
        };
        let err = draw_calldata(
            &RaffleId::new("raffle-1"),
            9,
            &DrawOptions::on_chain(ChainId::Polygon),
            &bad,
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[test]
    fn test_subscription_owner_word() {
        let mut out = Vec::new();
        out.extend_from_slice(&encode_uint(1_000));
        out.extend_from_slice(&encode_uint(3));
        out.extend_from_slice(&encode_address("0x00000000000000000000000000000000000000f1").unwrap());
        assert!(subscription_owned(&out).unwrap());

        out[2 * WORD..3 * WORD].fill(0);
        assert!(!subscription_owned(&out).unwrap());
        assert!(subscription_owned(&out[..WORD]).is_err());
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x1b4").unwrap(), 436);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_solana_endpoint_rejected() {
        assert!(JsonRpcChainAdapter::new(endpoint(ChainId::Solana)).is_err());
        assert!(JsonRpcChainAdapter::new(endpoint(ChainId::Polygon)).is_ok());
    }
}
