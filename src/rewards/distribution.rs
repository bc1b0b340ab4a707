//! Per-pool reward distribution windows and the reward-per-token index.
//!
//! A `PoolDistribution` streams `reward_rate` units per second between
//! `start_time` and `end_time`, split across the pool's effective stake through
//! the cumulative `reward_per_token_stored` index.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::crypto::PoolId;
use crate::utils::math::{safe_add, safe_div, safe_mul, serde_u256, FixedPoint, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// KIND & STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Which side of a lending pool a distribution rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    /// Suppliers, weighted by pool-share balance
    Supply,
    /// Borrowers, weighted by outstanding borrow balance
    Borrow,
}

impl DistributionKind {
    /// Both kinds, supply first
    pub const ALL: [DistributionKind; 2] = [DistributionKind::Supply, DistributionKind::Borrow];

    /// Get kind name
    pub fn name(&self) -> &'static str {
        match self {
            DistributionKind::Supply => "supply",
            DistributionKind::Borrow => "borrow",
        }
    }
}

impl std::fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DistributionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "supply" => Ok(DistributionKind::Supply),
            "borrow" => Ok(DistributionKind::Borrow),
            _ => Err(Error::InvalidParameter {
                name: "kind".into(),
                reason: format!("unknown distribution kind: {}", s),
            }),
        }
    }
}

/// Lifecycle of a distribution window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionState {
    /// Never scheduled
    Unconfigured,
    /// Scheduled, window not yet open
    Scheduled,
    /// Window open, reward streaming
    Active,
    /// Window closed; may be re-armed with a fresh schedule
    Expired,
}

impl DistributionState {
    /// True while the window can still be topped up
    pub fn is_live(&self) -> bool {
        matches!(self, DistributionState::Scheduled | DistributionState::Active)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL DISTRIBUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of advancing a distribution to some instant without writing it back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Reward-per-token index after the advance
    pub reward_per_token: FixedPoint,
    /// Reward streamed to stakers during the advance
    pub emitted: U256,
    /// New `last_update_time`
    pub last_update_time: u64,
}

/// Reward stream for one (pool, kind)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDistribution {
    /// Total reward allocated to the current window (grows with top-ups)
    #[serde(with = "serde_u256")]
    pub total_amount: U256,
    /// Reward units released per second
    #[serde(with = "serde_u256")]
    pub reward_rate: U256,
    /// Window start (unix seconds)
    pub start_time: u64,
    /// Window end (unix seconds)
    pub end_time: u64,
    /// Instant the index was last brought up to date
    pub last_update_time: u64,
    /// Cumulative reward per unit of effective stake
    pub reward_per_token_stored: FixedPoint,
    /// Reward actually streamed to stakers over the pool's lifetime
    #[serde(with = "serde_u256")]
    pub distributed: U256,
}

impl PoolDistribution {
    /// True once a window has ever been scheduled
    pub fn is_configured(&self) -> bool {
        self.end_time > self.start_time
    }

    /// State of the window at `now`
    pub fn state(&self, now: u64) -> DistributionState {
        if !self.is_configured() {
            DistributionState::Unconfigured
        } else if now < self.start_time {
            DistributionState::Scheduled
        } else if now < self.end_time {
            DistributionState::Active
        } else {
            DistributionState::Expired
        }
    }

    /// Arm a fresh window. The index and lifetime counters carry over.
    pub fn schedule(&mut self, amount: U256, start_time: u64, duration: u64) -> Result<()> {
        if duration == 0 {
            return Err(Error::InvalidParameter {
                name: "duration".into(),
                reason: "cannot be zero".into(),
            });
        }
        let end_time = start_time.checked_add(duration).ok_or_else(|| {
            Error::overflow(format!("{} + {}", start_time, duration))
        })?;

        self.reward_rate = safe_div(amount, U256::from(duration))?;
        self.total_amount = amount;
        self.start_time = start_time;
        self.end_time = end_time;
        self.last_update_time = start_time;
        Ok(())
    }

    /// Compute the index at `now` for a pool with `total_staked` effective stake.
    ///
    /// Time before `start_time` or after `end_time` earns nothing; a zero-stake
    /// interval advances the clock but leaves the index untouched, so that
    /// share of the reward is never released.
    pub fn accrue(&self, total_staked: U256, now: u64) -> Result<Accrual> {
        let upper = now.min(self.end_time);
        let last_update_time = self.last_update_time.max(upper);
        let dt = upper.saturating_sub(self.last_update_time);

        if !self.is_configured() || dt == 0 || total_staked.is_zero() || self.reward_rate.is_zero() {
            return Ok(Accrual {
                reward_per_token: self.reward_per_token_stored,
                emitted: U256::zero(),
                last_update_time,
            });
        }

        let emitted = safe_mul(self.reward_rate, U256::from(dt))?;
        let delta = FixedPoint::from_ratio(emitted, total_staked)?;

        Ok(Accrual {
            reward_per_token: self.reward_per_token_stored.checked_add(delta)?,
            emitted,
            last_update_time,
        })
    }

    /// Index at `now` without mutating
    pub fn reward_per_token(&self, total_staked: U256, now: u64) -> Result<FixedPoint> {
        Ok(self.accrue(total_staked, now)?.reward_per_token)
    }

    /// Bring the index up to `now`
    pub fn checkpoint(&mut self, total_staked: U256, now: u64) -> Result<()> {
        let accrual = self.accrue(total_staked, now)?;
        self.distributed = safe_add(self.distributed, accrual.emitted)?;
        self.reward_per_token_stored = accrual.reward_per_token;
        self.last_update_time = accrual.last_update_time;
        Ok(())
    }

    /// Add `amount` to a live window, re-spreading it over the time left.
    ///
    /// The caller must checkpoint at `now` first.
    pub fn top_up(&mut self, pool: &PoolId, amount: U256, now: u64) -> Result<()> {
        let reward_rate = match self.state(now) {
            DistributionState::Scheduled => {
                let duration = U256::from(self.end_time - self.start_time);
                safe_div(safe_add(self.total_amount, amount)?, duration)?
            }
            DistributionState::Active => {
                let remaining = U256::from(self.end_time - now);
                let leftover = safe_mul(self.reward_rate, remaining)?;
                safe_div(safe_add(leftover, amount)?, remaining)?
            }
            DistributionState::Unconfigured | DistributionState::Expired => {
                return Err(Error::DistributionExpired(pool.to_hex()));
            }
        };

        self.total_amount = safe_add(self.total_amount, amount)?;
        self.reward_rate = reward_rate;
        Ok(())
    }

    /// Reward still to be released after `now` at the current rate
    pub fn remaining_reward(&self, now: u64) -> Result<U256> {
        if !self.state(now).is_live() {
            return Ok(U256::zero());
        }
        let from = now.max(self.start_time);
        safe_mul(self.reward_rate, U256::from(self.end_time - from))
    }
}
