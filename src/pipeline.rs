//! Replacement pipeline: lookup, policy, signing, broadcast
//!
//! Each stage waits for the previous one; a failure at any stage ends the run
//! and nothing after it is attempted.

use crate::chain::{ChainReader, Gateway, HttpGateway, PendingTransaction};
use crate::config::Settings;
use crate::error::{SpeedupError, SpeedupResult};
use crate::tx::{
    build_replacement, decode_signed, KeyMaterial, ReplacementPolicy, SignedTransaction,
    TransactionBroadcaster, TransactionSigner,
};

use ethers::types::{NameOrAddress, H256, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the caller wants replaced, and how
#[derive(Debug, Clone)]
pub struct ReplacementRequest {
    pub tx_hash: H256,
    pub gas_price_gwei: u64,
    /// 0 keeps the original gas limit
    pub gas_limit_override: u64,
    pub private_key: KeyMaterial,
}

/// Result of a replacement run
#[derive(Debug, Clone)]
pub struct ReplacementOutcome {
    pub original_hash: H256,
    /// Keccak-256 of the signed encoding, computed locally
    pub replacement_hash: H256,
    pub raw_hex: String,
    pub chain_id: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// Hash reported by the node; `None` on a dry run
    pub broadcast_hash: Option<H256>,
}

/// Runs one replacement end to end
pub struct ReplacementPipeline {
    reader: ChainReader,
    policy: ReplacementPolicy,
    broadcaster: TransactionBroadcaster,
    dry_run: bool,
}

impl ReplacementPipeline {
    pub fn new(gateway: Arc<dyn Gateway>, policy: ReplacementPolicy, dry_run: bool) -> Self {
        Self {
            reader: ChainReader::new(gateway.clone()),
            policy,
            broadcaster: TransactionBroadcaster::new(gateway),
            dry_run,
        }
    }

    /// Pipeline over HTTP to the configured node
    pub fn from_settings(settings: &Settings) -> SpeedupResult<Self> {
        let gateway = HttpGateway::new(&settings.rpc_url, settings.request_timeout)?;
        Ok(Self::new(
            Arc::new(gateway),
            ReplacementPolicy::new(settings.replacement_rule),
            settings.dry_run,
        ))
    }

    pub async fn run(&self, request: &ReplacementRequest) -> SpeedupResult<ReplacementOutcome> {
        // Bad key material should fail before touching the network
        let signer = TransactionSigner::from_key(&request.private_key)?;
        info!("Signing as {:?}", signer.sender());

        let pending = self.reader.pending_transaction(request.tx_hash).await?;
        if let Some(from) = pending.from {
            if from != signer.sender() {
                warn!(
                    "Transaction {:?} was sent by {:?}, not by the signing key; the node will treat the replacement as a new transaction",
                    pending.hash, from
                );
            }
        }

        let plan = self
            .policy
            .plan(&pending, request.gas_price_gwei, request.gas_limit_override)?;
        debug!("Maximum fee for replacement: {} wei", plan.max_cost());

        let chain_id = self.reader.chain_id().await?;

        let replacement = build_replacement(&pending, &plan);
        let signed = signer.sign(&replacement, chain_id)?;
        check_preserved(&pending, &signed)?;
        info!("tx: {:?}", signed.hash());
        info!("hex: {}", signed.raw_hex());

        let broadcast_hash = if self.dry_run {
            info!("Dry run, not broadcasting");
            None
        } else {
            let hash = self.broadcaster.submit(&signed).await?;
            info!("send result: {:?}", hash);
            Some(hash)
        };

        Ok(ReplacementOutcome {
            original_hash: pending.hash,
            replacement_hash: signed.hash(),
            raw_hex: signed.raw_hex(),
            chain_id,
            gas_price: plan.gas_price,
            gas_limit: plan.gas_limit,
            broadcast_hash,
        })
    }
}

/// Decode the signed bytes and check the fields that must carry over unchanged
fn check_preserved(pending: &PendingTransaction, signed: &SignedTransaction) -> SpeedupResult<()> {
    let (decoded, signature) = decode_signed(signed.raw())?;

    let preserved = decoded.nonce == Some(U256::from(pending.nonce))
        && decoded.to == pending.to.map(NameOrAddress::Address)
        && decoded.value == Some(pending.value)
        && decoded.data.unwrap_or_default() == pending.data
        && &signature == signed.signature();

    if !preserved {
        return Err(SpeedupError::Signing(format!(
            "encoded replacement for {:?} does not carry the original nonce, recipient, value and data",
            pending.hash
        )));
    }

    Ok(())
}
