//! Persistent state owned by a reward controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::rewards::boost::BoostConfig;
use crate::rewards::distribution::{DistributionKind, PoolDistribution};
use crate::rewards::snapshot::AccountRewardSnapshot;
use crate::utils::crypto::{AccountId, PoolId, StateHash};
use crate::utils::math::{safe_add, serde_u256, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// PER-POOL STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Distribution, stake total and account snapshots for one side of a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindRewards {
    /// Reward window and index
    pub distribution: PoolDistribution,
    /// Sum of every account's effective balance; the checkpoint denominator
    #[serde(with = "serde_u256")]
    pub total_effective: U256,
    /// Per-account snapshots
    pub accounts: BTreeMap<AccountId, AccountRewardSnapshot>,
}

impl KindRewards {
    /// Snapshot of `account`, default if it never settled
    pub fn snapshot(&self, account: &AccountId) -> AccountRewardSnapshot {
        self.accounts.get(account).cloned().unwrap_or_default()
    }

    /// Index checkpoint at `now`
    pub fn checkpoint(&mut self, now: u64) -> Result<()> {
        self.distribution.checkpoint(self.total_effective, now)
    }

    /// Earned by `account` at `now`, without mutating
    pub fn earned(&self, account: &AccountId, now: u64) -> Result<U256> {
        let index = self.distribution.reward_per_token(self.total_effective, now)?;
        self.snapshot(account).earned(index)
    }

    /// Fold pending reward into the snapshot and swap in a new stake.
    ///
    /// The caller must checkpoint at `now` first.
    pub fn settle(&mut self, account: &AccountId, staked: U256, extra: U256) -> Result<U256> {
        let index = self.distribution.reward_per_token_stored;
        let mut snapshot = self.snapshot(account);
        snapshot.accrue(index)?;

        let previous = snapshot.effective_balance()?;
        snapshot.staked = staked;
        snapshot.extra = extra;
        let effective = snapshot.effective_balance()?;

        self.total_effective = safe_add(self.total_effective.saturating_sub(previous), effective)?;
        self.accounts.insert(*account, snapshot);
        Ok(effective)
    }

    /// Zero the account's unpaid reward, returning it
    pub fn take_unpaid(&mut self, account: &AccountId) -> U256 {
        self.accounts
            .get_mut(account)
            .map(AccountRewardSnapshot::take_unpaid)
            .unwrap_or_default()
    }
}

/// Both sides of one lending pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRewards {
    /// Disabled pools reject new schedules and top-ups; accrual continues
    pub enabled: bool,
    /// Supplier rewards
    pub supply: KindRewards,
    /// Borrower rewards
    pub borrow: KindRewards,
}

impl Default for PoolRewards {
    fn default() -> Self {
        Self {
            enabled: true,
            supply: KindRewards::default(),
            borrow: KindRewards::default(),
        }
    }
}

impl PoolRewards {
    /// State for one side
    pub fn kind(&self, kind: DistributionKind) -> &KindRewards {
        match kind {
            DistributionKind::Supply => &self.supply,
            DistributionKind::Borrow => &self.borrow,
        }
    }

    /// Mutable state for one side
    pub fn kind_mut(&mut self, kind: DistributionKind) -> &mut KindRewards {
        match kind {
            DistributionKind::Supply => &mut self.supply,
            DistributionKind::Borrow => &mut self.borrow,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUDGET
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward the controller has been promised, split by whether it is scheduled yet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBudget {
    /// Promised but not yet scheduled into any pool
    #[serde(with = "serde_u256")]
    pub unallocated: U256,
    /// Scheduled into pools and not yet paid out
    #[serde(with = "serde_u256")]
    pub outstanding: U256,
}

impl RewardBudget {
    /// Everything the reward sink is expected to cover
    pub fn committed(&self) -> Result<U256> {
        safe_add(self.unallocated, self.outstanding)
    }

    /// Move `amount` from unallocated to outstanding
    pub fn allocate(&mut self, amount: U256) -> Result<()> {
        if self.unallocated < amount {
            return Err(Error::NotEnoughBalance {
                required: amount,
                available: self.unallocated,
            });
        }
        self.unallocated -= amount;
        self.outstanding = safe_add(self.outstanding, amount)?;
        Ok(())
    }

    /// Record a payout
    pub fn release(&mut self, amount: U256) {
        self.outstanding = self.outstanding.saturating_sub(amount);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a controller persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedger {
    /// Registered pools
    pub pools: BTreeMap<PoolId, PoolRewards>,
    /// Reward budget
    pub budget: RewardBudget,
    /// Boost parameters
    pub boost: BoostConfig,
}

impl RewardLedger {
    /// Create an empty ledger with the given boost
    pub fn new(boost: BoostConfig) -> Self {
        Self {
            boost,
            ..Default::default()
        }
    }

    /// Registered pool, if any
    pub fn pool(&self, pool: &PoolId) -> Option<&PoolRewards> {
        self.pools.get(pool)
    }

    /// Registered pool or `DisabledToken`
    pub fn require_pool(&self, pool: &PoolId) -> Result<&PoolRewards> {
        self.pools
            .get(pool)
            .ok_or_else(|| Error::DisabledToken(pool.to_hex()))
    }

    /// Serialize to compact binary
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from compact binary
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash
    pub fn state_hash(&self) -> StateHash {
        let data = bincode::serialize(self).unwrap_or_default();
        StateHash::sha256(&data)
    }
}
