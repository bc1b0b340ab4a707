//! Voting-escrow boost.
//!
//! An account holding at least `min_ve_amount` of the escrow token earns on
//! `staked + extra`, where `extra = min(ve_balance, staked) * ratio_pct / 100`.
//! The boost grows linearly with escrow balance and caps once the escrow
//! balance matches the stake. It is recomputed only at settlement.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::BOOST_RATIO_DIVISOR;
use crate::utils::math::{mul_div, serde_u256, U256};

/// Boost parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostConfig {
    /// Extra stake granted at full boost, in percent of base stake
    pub ratio_pct: u64,
    /// Escrow balance required before any boost applies
    #[serde(with = "serde_u256")]
    pub min_ve_amount: U256,
}

impl BoostConfig {
    /// Boost switched off
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build and validate against the largest accepted ratio
    pub fn new(ratio_pct: u64, min_ve_amount: U256, max_ratio_pct: u64) -> Result<Self> {
        let config = Self {
            ratio_pct,
            min_ve_amount,
        };
        config.validate(max_ratio_pct)?;
        Ok(config)
    }

    /// Check parameter consistency
    pub fn validate(&self, max_ratio_pct: u64) -> Result<()> {
        if self.ratio_pct > max_ratio_pct {
            return Err(Error::InvalidRatio(format!(
                "boost ratio {}% exceeds maximum {}%",
                self.ratio_pct, max_ratio_pct
            )));
        }
        if self.ratio_pct > 0 && self.min_ve_amount.is_zero() {
            return Err(Error::InvalidRatio(
                "minimum escrow amount must be positive when boost is enabled".into(),
            ));
        }
        Ok(())
    }

    /// True if any account can be boosted
    pub fn is_enabled(&self) -> bool {
        self.ratio_pct > 0
    }

    /// Extra effective stake for an account
    pub fn extra_for(&self, staked: U256, ve_balance: U256) -> Result<U256> {
        if !self.is_enabled() || staked.is_zero() || ve_balance < self.min_ve_amount {
            return Ok(U256::zero());
        }
        mul_div(
            ve_balance.min(staked),
            U256::from(self.ratio_pct),
            U256::from(BOOST_RATIO_DIVISOR),
        )
    }
}
