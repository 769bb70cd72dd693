//! Replacement transaction policy, signing and submission

mod policy;
mod sender;
mod signer;

pub use policy::{gwei_to_wei, ReplacementPlan, ReplacementPolicy};
pub use sender::TransactionBroadcaster;
pub use signer::{build_replacement, decode_signed, KeyMaterial, SignedTransaction, TransactionSigner};
