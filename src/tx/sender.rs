//! Broadcasts signed transactions to the node
//!
//! There is no retry: a second submission of the same replacement cannot help
//! and a rejection message from the node is the most useful diagnostic.

use super::signer::SignedTransaction;
use crate::chain::Gateway;
use crate::error::{SpeedupError, SpeedupResult};

use ethers::types::H256;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Submits raw transactions through a [`Gateway`]
pub struct TransactionBroadcaster {
    gateway: Arc<dyn Gateway>,
}

impl TransactionBroadcaster {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Send `signed` and return the hash reported by the node
    pub async fn submit(&self, signed: &SignedTransaction) -> SpeedupResult<H256> {
        let result = self
            .gateway
            .invoke("eth_sendRawTransaction", vec![Value::String(signed.raw_hex())])
            .await;

        let value = match result {
            Ok(value) => value,
            Err(SpeedupError::Rpc { code, message }) => {
                warn!("Node rejected transaction {:?} (code {})", signed.hash(), code);
                return Err(SpeedupError::BroadcastRejected { message });
            }
            Err(e) => return Err(e),
        };

        let reported = value
            .as_str()
            .ok_or_else(|| SpeedupError::decode("result", value.to_string(), "expected a hash string"))?;
        let node_hash =
            H256::from_str(reported).map_err(|e| SpeedupError::decode("result", reported, e))?;

        if node_hash != signed.hash() {
            warn!(
                "Node reported hash {:?} but the local hash is {:?}; check chain id and encoding",
                node_hash,
                signed.hash()
            );
        }

        info!("Transaction sent: {:?}", node_hash);
        Ok(node_hash)
    }
}
