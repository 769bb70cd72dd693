//! Replacement transaction construction, EIP-155 signing and RLP codec
//!
//! The signing message is the RLP list
//! `(nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0)` and the wire
//! encoding is `(nonce, gasPrice, gasLimit, to, value, data, v, r, s)` with
//! `v = recovery_id + 35 + 2 * chainId`. Signatures use RFC 6979 nonces, so the
//! same inputs always produce the same bytes.

use super::policy::ReplacementPlan;
use crate::chain::{PendingTransaction, MAX_CHAIN_ID};
use crate::error::{SpeedupError, SpeedupResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, TransactionRequest, H256};
use ethers::utils::rlp::Rlp;
use sha3::{Digest, Keccak256};
use std::fmt;

/// Hex-encoded private key; never printed
#[derive(Clone)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self(hex_key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Rebuild `pending` as a legacy transaction carrying the planned gas settings.
///
/// Nonce, recipient, value and payload are copied unchanged.
pub fn build_replacement(pending: &PendingTransaction, plan: &ReplacementPlan) -> TransactionRequest {
    let mut tx = TransactionRequest::new()
        .nonce(pending.nonce)
        .value(pending.value)
        .data(pending.data.clone())
        .gas(plan.gas_limit)
        .gas_price(plan.gas_price);

    if let Some(to) = pending.to {
        tx = tx.to(to);
    }

    tx
}

/// A signed legacy transaction and its wire encoding
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    request: TransactionRequest,
    chain_id: u64,
    signature: Signature,
    raw: Bytes,
    hash: H256,
}

impl SignedTransaction {
    /// The signed fields, including the chain id
    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// RLP wire encoding
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// `0x`-prefixed hex of the wire encoding, as sent to the node
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    /// Keccak-256 of the wire encoding
    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Signs replacement transactions with a local secp256k1 key
pub struct TransactionSigner {
    wallet: LocalWallet,
}

impl TransactionSigner {
    /// Parse a hex private key, with or without `0x`
    pub fn from_key(key: &KeyMaterial) -> SpeedupResult<Self> {
        let trimmed = key.expose().trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let invalid = |reason: String| SpeedupError::InvalidPrivateKey { reason };

        let bytes = hex::decode(digits).map_err(|e| invalid(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(invalid(format!("expected 32 bytes, got {}", bytes.len())));
        }

        let wallet = LocalWallet::from_bytes(&bytes).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { wallet })
    }

    /// Address controlled by the key
    pub fn sender(&self) -> Address {
        self.wallet.address()
    }

    /// Sign `request` for `chain_id` and encode it
    pub fn sign(&self, request: &TransactionRequest, chain_id: u64) -> SpeedupResult<SignedTransaction> {
        if chain_id == 0 || chain_id > MAX_CHAIN_ID {
            return Err(SpeedupError::Signing(format!(
                "chain id {} is outside 1..={}",
                chain_id, MAX_CHAIN_ID
            )));
        }

        let request = request.clone().chain_id(chain_id);
        let typed = TypedTransaction::Legacy(request.clone());

        let signature = self
            .wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| SpeedupError::Signing(e.to_string()))?;

        let raw = typed.rlp_signed(&signature);
        let hash = H256::from_slice(&Keccak256::digest(&raw));

        Ok(SignedTransaction {
            request,
            chain_id,
            signature,
            raw,
            hash,
        })
    }
}

/// Decode a signed legacy wire encoding back into its fields and signature
pub fn decode_signed(raw: &[u8]) -> SpeedupResult<(TransactionRequest, Signature)> {
    let rlp = Rlp::new(raw);
    TransactionRequest::decode_signed_rlp(&rlp)
        .map_err(|e| SpeedupError::decode("raw_transaction", format!("0x{}", hex::encode(raw)), e))
}
