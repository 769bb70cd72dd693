//! Chain reader: chain identity and pending transaction lookup
//!
//! Numeric fields arrive as `0x`-prefixed hex quantities. Gas limits and
//! nonces are decoded as `u64`, prices and values as `U256`; the two paths
//! are kept separate so a limit is never compared against a price.

use super::Gateway;
use crate::error::{SpeedupError, SpeedupResult};

use ethers::types::{Address, Bytes, H256, U256};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest chain id whose EIP-155 `v` (`recovery_id + 35 + 2 * chain_id`) fits in a `u64`
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// A transaction as currently known to the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: H256,
    pub from: Option<Address>,
    pub nonce: u64,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    /// Wei per gas
    pub gas_price: U256,
    /// Set once the transaction is included in a block
    pub block_number: Option<u64>,
}

/// Raw `eth_getTransactionByHash` payload, before hex decoding
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: Option<String>,
    from: Option<String>,
    nonce: Option<String>,
    to: Option<String>,
    value: Option<String>,
    input: Option<String>,
    data: Option<String>,
    gas: Option<String>,
    gas_price: Option<String>,
    block_number: Option<String>,
}

/// Reads chain state through a [`Gateway`]
pub struct ChainReader {
    gateway: Arc<dyn Gateway>,
}

impl ChainReader {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Chain id used as the EIP-155 domain separator, from `net_version`
    pub async fn chain_id(&self) -> SpeedupResult<u64> {
        let result = self
            .gateway
            .invoke("net_version", vec![])
            .await
            .map_err(|e| SpeedupError::ChainIdUnavailable {
                reason: e.to_string(),
            })?;

        let chain_id = parse_chain_id(&result)?;
        info!("Network id: {}", chain_id);
        Ok(chain_id)
    }

    /// Fetch a transaction and make sure it is still pending
    pub async fn pending_transaction(&self, tx_hash: H256) -> SpeedupResult<PendingTransaction> {
        let result = self
            .gateway
            .invoke(
                "eth_getTransactionByHash",
                vec![Value::String(format!("{:?}", tx_hash))],
            )
            .await?;

        if result.is_null() {
            return Err(SpeedupError::TransactionNotFound { tx_hash });
        }

        let tx = decode_transaction(result)?;
        if tx.hash != tx_hash {
            warn!(
                "Node answered a lookup for {:?} with transaction {:?}",
                tx_hash, tx.hash
            );
        }
        debug!(
            "Fetched tx {:?}: nonce={} gas={} gas_price={} block={:?}",
            tx.hash, tx.nonce, tx.gas_limit, tx.gas_price, tx.block_number
        );

        if let Some(block_number) = tx.block_number {
            return Err(SpeedupError::TransactionAlreadyMined {
                tx_hash,
                block_number,
            });
        }

        Ok(tx)
    }
}

/// Parse a `net_version` result: decimal string, hex string or JSON number
fn parse_chain_id(value: &Value) -> SpeedupResult<u64> {
    let unavailable = |reason: String| SpeedupError::ChainIdUnavailable { reason };

    let chain_id = match value {
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(digits) => u64::from_str_radix(digits, 16),
                None => s.parse::<u64>(),
            }
            .map_err(|e| unavailable(format!("{:?} is not a valid chain id: {}", s, e)))?
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| unavailable(format!("{} is not a valid chain id", n)))?,
        other => return Err(unavailable(format!("unexpected result {}", other))),
    };

    if chain_id == 0 {
        return Err(unavailable("chain id must be positive".to_string()));
    }
    if chain_id > MAX_CHAIN_ID {
        return Err(unavailable(format!(
            "chain id {} exceeds the EIP-155 maximum {}",
            chain_id, MAX_CHAIN_ID
        )));
    }

    Ok(chain_id)
}

fn decode_transaction(value: Value) -> SpeedupResult<PendingTransaction> {
    let raw_text = value.to_string();
    let raw: RpcTransaction = serde_json::from_value(value)
        .map_err(|e| SpeedupError::decode("transaction", raw_text, e))?;

    let input = raw.input.or(raw.data);

    Ok(PendingTransaction {
        hash: decode_h256("hash", required("hash", &raw.hash)?)?,
        from: raw.from.as_deref().map(|s| decode_address("from", s)).transpose()?,
        nonce: decode_u64("nonce", required("nonce", &raw.nonce)?)?,
        to: raw.to.as_deref().map(|s| decode_address("to", s)).transpose()?,
        value: decode_u256("value", required("value", &raw.value)?)?,
        data: decode_bytes("input", required("input", &input)?)?,
        gas_limit: decode_u64("gas", required("gas", &raw.gas)?)?,
        gas_price: decode_u256("gasPrice", required("gasPrice", &raw.gas_price)?)?,
        block_number: raw
            .block_number
            .as_deref()
            .map(|s| decode_u64("blockNumber", s))
            .transpose()?,
    })
}

fn required<'a>(field: &str, value: &'a Option<String>) -> SpeedupResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| SpeedupError::decode(field, "null", "field is missing"))
}

/// Digits of a hex quantity; the `0x` prefix is mandatory
fn quantity_digits<'a>(field: &str, raw: &'a str) -> SpeedupResult<&'a str> {
    match raw.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() => Ok(digits),
        Some(_) => Err(SpeedupError::decode(field, raw, "empty hex quantity")),
        None => Err(SpeedupError::decode(field, raw, "missing 0x prefix")),
    }
}

fn decode_u64(field: &str, raw: &str) -> SpeedupResult<u64> {
    let digits = quantity_digits(field, raw)?;
    u64::from_str_radix(digits, 16).map_err(|e| SpeedupError::decode(field, raw, e))
}

fn decode_u256(field: &str, raw: &str) -> SpeedupResult<U256> {
    let digits = quantity_digits(field, raw)?;
    U256::from_str_radix(digits, 16).map_err(|e| SpeedupError::decode(field, raw, e))
}

fn decode_bytes(field: &str, raw: &str) -> SpeedupResult<Bytes> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| SpeedupError::decode(field, raw, "missing 0x prefix"))?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| SpeedupError::decode(field, raw, e))
}

fn decode_address(field: &str, raw: &str) -> SpeedupResult<Address> {
    Address::from_str(raw).map_err(|e| SpeedupError::decode(field, raw, e))
}

fn decode_h256(field: &str, raw: &str) -> SpeedupResult<H256> {
    H256::from_str(raw).map_err(|e| SpeedupError::decode(field, raw, e))
}
