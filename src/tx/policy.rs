//! Replacement fee policy
//!
//! A node only swaps a pending transaction for one with the same nonce when the
//! new gas price is high enough. The local check here is the minimum; nodes may
//! apply a stricter bump on top of it.

use crate::chain::PendingTransaction;
use crate::config::ReplacementRule;
use crate::error::{SpeedupError, SpeedupResult};

use ethers::types::U256;
use tracing::debug;

pub const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Convert a gas price in gwei to wei
pub fn gwei_to_wei(gwei: u64) -> U256 {
    U256::from(gwei) * U256::from(WEI_PER_GWEI)
}

/// Gas settings the replacement transaction will carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacementPlan {
    /// Wei per gas
    pub gas_price: U256,
    pub gas_limit: u64,
}

impl ReplacementPlan {
    /// Upper bound of the fee paid, in wei
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_limit) * self.gas_price
    }
}

/// Validates replacement gas prices
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplacementPolicy {
    rule: ReplacementRule,
}

impl ReplacementPolicy {
    pub fn new(rule: ReplacementRule) -> Self {
        Self { rule }
    }

    /// Check a requested gas price against the original one, both in wei
    pub fn validate(&self, original: U256, requested: U256) -> SpeedupResult<()> {
        let acceptable = match self.rule {
            ReplacementRule::AtLeast => requested >= original,
            ReplacementRule::StrictlyGreater => requested > original,
        };

        if !acceptable {
            return Err(SpeedupError::GasPriceTooLow {
                requested,
                original,
                rule: self.rule,
            });
        }

        Ok(())
    }

    /// Larger of the original limit and the override; an override of 0 keeps the original
    pub fn effective_gas_limit(original: u64, override_limit: u64) -> u64 {
        original.max(override_limit)
    }

    /// Decide the gas price and limit for replacing `pending`
    pub fn plan(
        &self,
        pending: &PendingTransaction,
        gas_price_gwei: u64,
        gas_limit_override: u64,
    ) -> SpeedupResult<ReplacementPlan> {
        let gas_price = gwei_to_wei(gas_price_gwei);
        self.validate(pending.gas_price, gas_price)?;

        let gas_limit = Self::effective_gas_limit(pending.gas_limit, gas_limit_override);
        debug!(
            "Replacement plan: gas_price {} -> {}, gas_limit {} -> {}",
            pending.gas_price, gas_price, pending.gas_limit, gas_limit
        );

        Ok(ReplacementPlan {
            gas_price,
            gas_limit,
        })
    }
}
