//! Chain module - node access for the replacement pipeline
//!
//! This module provides:
//! - The `Gateway` capability and its HTTP implementation
//! - Chain id and pending transaction lookup on top of it

pub mod gateway;
pub mod reader;

#[cfg(test)]
pub mod fake;

pub use gateway::{Gateway, HttpGateway};
pub use reader::{ChainReader, PendingTransaction, MAX_CHAIN_ID};
