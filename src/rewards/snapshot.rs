//! Per-account reward snapshots.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::math::{safe_add, serde_u256, FixedPoint, U256};

/// What an account was owed, and on what stake, at its last settlement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRewardSnapshot {
    /// Index value last folded into `accrued_unpaid`
    pub reward_per_token_paid: FixedPoint,
    /// Reward owed but not yet paid out
    #[serde(with = "serde_u256")]
    pub accrued_unpaid: U256,
    /// Base staked balance read at last settlement
    #[serde(with = "serde_u256")]
    pub staked: U256,
    /// Boost granted at last settlement
    #[serde(with = "serde_u256")]
    pub extra: U256,
}

impl AccountRewardSnapshot {
    /// Stake that earns reward until the next settlement
    pub fn effective_balance(&self) -> Result<U256> {
        safe_add(self.staked, self.extra)
    }

    /// `effective * (index - paid) / SCALE + accrued_unpaid`
    pub fn earned(&self, reward_per_token: FixedPoint) -> Result<U256> {
        let pending = reward_per_token
            .saturating_sub(self.reward_per_token_paid)
            .mul_amount(self.effective_balance()?)?;
        safe_add(self.accrued_unpaid, pending)
    }

    /// Fold everything earned up to `reward_per_token` into `accrued_unpaid`
    pub fn accrue(&mut self, reward_per_token: FixedPoint) -> Result<()> {
        self.accrued_unpaid = self.earned(reward_per_token)?;
        self.reward_per_token_paid = reward_per_token;
        Ok(())
    }

    /// Zero `accrued_unpaid`, returning what it held
    pub fn take_unpaid(&mut self) -> U256 {
        std::mem::take(&mut self.accrued_unpaid)
    }
}
