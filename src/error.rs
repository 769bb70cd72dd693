//! Error types for transaction replacement

use crate::config::ReplacementRule;

use ethers::types::{H256, U256};
use thiserror::Error;

/// Main error type for the replacement pipeline
#[derive(Error, Debug)]
pub enum SpeedupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Chain id unavailable: {reason}")]
    ChainIdUnavailable { reason: String },

    #[error("Invalid transaction id {value:?}: {reason}")]
    InvalidTransactionId { value: String, reason: String },

    #[error("Transaction {tx_hash:?} not found")]
    TransactionNotFound { tx_hash: H256 },

    #[error("Transaction {tx_hash:?} already mined in block {block_number}")]
    TransactionAlreadyMined { tx_hash: H256, block_number: u64 },

    #[error("Failed to decode field `{field}` from {value:?}: {reason}")]
    Decode {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Gas price too low: requested {requested} wei, original {original} wei ({rule})")]
    GasPriceTooLow {
        requested: U256,
        original: U256,
        rule: ReplacementRule,
    },

    #[error("Invalid private key: {reason}")]
    InvalidPrivateKey { reason: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Broadcast rejected by node: {message}")]
    BroadcastRejected { message: String },
}

impl SpeedupError {
    /// Build a decode error for a named response field
    pub fn decode(field: &str, value: impl Into<String>, reason: impl ToString) -> Self {
        SpeedupError::Decode {
            field: field.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if the node refused the request, as opposed to a local or transport failure
    pub fn is_node_rejection(&self) -> bool {
        matches!(
            self,
            SpeedupError::Rpc { .. }
                | SpeedupError::BroadcastRejected { .. }
                | SpeedupError::TransactionNotFound { .. }
                | SpeedupError::TransactionAlreadyMined { .. }
        )
    }
}

/// Result type for replacement operations
pub type SpeedupResult<T> = Result<T, SpeedupError>;
