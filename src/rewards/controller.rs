//! Reward controller for lending pools.
//!
//! The controller streams reward to the supply and borrow sides of each
//! registered pool, tracks every account's share through the
//! reward-per-token index, and pays out through a [`RewardSink`].
//!
//! ## Lifecycle
//!
//! ```text
//! set_token_distribution ─► distribute_rewards_2_pool ─► (hooks / checkpoints) ─► harvest_for
//!         budget                 Scheduled → Active             accrual               payout
//!                                  ▲          │
//!                                  └─ re-arm ◄┘ Expired
//! ```
//!
//! Every mutating operation stages its changes on a copy of the touched pool
//! state and commits only once every check and the sink payout have passed.
//! Effective balances are sticky: a staker's base balance and boost are read
//! from the stake and escrow sources at settlement and held until the next one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::EngineConfig;
use crate::error::{Error, Result};
use crate::rewards::boost::BoostConfig;
use crate::rewards::distribution::{DistributionKind, DistributionState, PoolDistribution};
use crate::rewards::events::{EventLog, RewardEvent};
use crate::rewards::ledger::{PoolRewards, RewardBudget, RewardLedger};
use crate::rewards::snapshot::AccountRewardSnapshot;
use crate::rewards::sources::{RewardSink, StakeSource, VotingEscrow};
use crate::utils::crypto::{AccountId, PoolId};
use crate::utils::math::{safe_add, serde_u256, FixedPoint, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time view of one side of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    /// Window state
    pub state: DistributionState,
    /// Units per second
    #[serde(with = "serde_u256")]
    pub reward_rate: U256,
    /// Checkpoint denominator
    #[serde(with = "serde_u256")]
    pub total_effective: U256,
    /// Index as of the queried instant
    pub reward_per_token: FixedPoint,
    /// Reward streamed to stakers so far, including the unrecorded tail
    #[serde(with = "serde_u256")]
    pub distributed: U256,
    /// Reward still to be released in the current window
    #[serde(with = "serde_u256")]
    pub remaining: U256,
    /// Accounts with a snapshot
    pub accounts: usize,
}

/// Point-in-time view of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Pool
    pub pool: PoolId,
    /// Whether new schedules are accepted
    pub enabled: bool,
    /// Supplier side
    pub supply: KindStats,
    /// Borrower side
    pub borrow: KindStats,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Time-weighted reward accrual engine
pub struct Controller<S, V, R> {
    config: EngineConfig,
    ledger: RewardLedger,
    stake: S,
    escrow: V,
    sink: R,
    events: EventLog,
}

impl<S, V, R> Controller<S, V, R>
where
    S: StakeSource,
    V: VotingEscrow,
    R: RewardSink,
{
    /// Create a controller with an empty ledger
    pub fn new(config: EngineConfig, stake: S, escrow: V, sink: R) -> Result<Self> {
        let ledger = RewardLedger::new(config.default_boost.clone());
        Self::with_ledger(config, ledger, stake, escrow, sink)
    }

    /// Create a controller over previously persisted state
    pub fn with_ledger(
        config: EngineConfig,
        ledger: RewardLedger,
        stake: S,
        escrow: V,
        sink: R,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ledger,
            stake,
            escrow,
            sink,
            events: EventLog::new(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Make a pool known to the controller, enabled
    pub fn register_pool(&mut self, pool: PoolId, now: u64) -> Result<()> {
        if self.ledger.pools.contains_key(&pool) {
            return Err(Error::InvalidParameter {
                name: "pool".into(),
                reason: format!("{} already registered", pool),
            });
        }
        self.ledger.pools.insert(pool, PoolRewards::default());
        self.events.push(RewardEvent::PoolRegistered {
            pool,
            timestamp: now,
        });
        tracing::info!("Pool {} registered", pool.short());
        Ok(())
    }

    /// Enable or disable new schedules and top-ups for a pool.
    ///
    /// Accrual, settlement and harvesting continue while disabled.
    pub fn set_pool_enabled(&mut self, pool: &PoolId, enabled: bool, now: u64) -> Result<()> {
        let rewards = self
            .ledger
            .pools
            .get_mut(pool)
            .ok_or_else(|| Error::DisabledToken(pool.to_hex()))?;
        rewards.enabled = enabled;
        self.events.push(RewardEvent::PoolEnabledChanged {
            pool: *pool,
            enabled,
            timestamp: now,
        });
        tracing::info!("Pool {} enabled={}", pool.short(), enabled);
        Ok(())
    }

    /// Grow the unallocated reward budget by `more_amount`
    pub fn set_token_distribution(&mut self, more_amount: U256, now: u64) -> Result<()> {
        let mut budget = self.ledger.budget.clone();
        budget.unallocated = safe_add(budget.unallocated, more_amount)?;
        self.check_reserves(&budget)?;

        self.ledger.budget = budget;
        self.events.push(RewardEvent::BudgetIncreased {
            amount: more_amount,
            unallocated: self.ledger.budget.unallocated,
            timestamp: now,
        });
        tracing::info!(
            "Reward budget increased by {} (unallocated {})",
            more_amount,
            self.ledger.budget.unallocated
        );
        Ok(())
    }

    /// Replace the boost parameters.
    ///
    /// Existing snapshots keep their boost until their next settlement.
    pub fn set_boost(&mut self, ratio_pct: u64, min_ve_amount: U256, now: u64) -> Result<()> {
        let boost = BoostConfig::new(ratio_pct, min_ve_amount, self.config.max_boost_ratio_pct)?;
        self.ledger.boost = boost;
        self.events.push(RewardEvent::BoostConfigured {
            ratio_pct,
            min_ve_amount,
            timestamp: now,
        });
        tracing::info!("Boost set to {}% above {} escrow", ratio_pct, min_ve_amount);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DISTRIBUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Arm fresh windows on one or both sides of `pool`.
    ///
    /// A side with a zero amount is left untouched. Re-arming an expired side
    /// keeps its index, so earlier accrual stays claimable.
    pub fn distribute_rewards_2_pool(
        &mut self,
        pool: &PoolId,
        supply_amount: U256,
        borrow_amount: U256,
        start_time: u64,
        duration: u64,
        now: u64,
    ) -> Result<()> {
        let mut staged = self.enabled_pool(pool)?.clone();
        if start_time < now {
            return Err(Error::InvalidParameter {
                name: "start_time".into(),
                reason: format!("{} is before now ({})", start_time, now),
            });
        }
        self.config.check_duration(duration)?;

        let amounts = [
            (DistributionKind::Supply, supply_amount),
            (DistributionKind::Borrow, borrow_amount),
        ];
        let total = nonzero_total(&amounts)?;

        let mut budget = self.ledger.budget.clone();
        budget.allocate(total)?;

        let mut events = Vec::new();
        for (kind, amount) in amounts {
            if amount.is_zero() {
                continue;
            }
            let rewards = staged.kind_mut(kind);
            let state = rewards.distribution.state(now);
            if state.is_live() {
                return Err(Error::InvalidParameter {
                    name: kind.name().into(),
                    reason: format!("distribution is still {:?}; top it up instead", state),
                });
            }
            if amount < U256::from(duration) {
                return Err(Error::InvalidParameter {
                    name: kind.name().into(),
                    reason: format!("amount {} is below one unit per second over {}s", amount, duration),
                });
            }

            rewards.checkpoint(now)?;
            rewards.distribution.schedule(amount, start_time, duration)?;
            events.push(RewardEvent::DistributionScheduled {
                pool: *pool,
                kind,
                amount,
                reward_rate: rewards.distribution.reward_rate,
                start_time,
                end_time: rewards.distribution.end_time,
            });
        }

        self.commit_pool(*pool, staged);
        self.ledger.budget = budget;
        tracing::info!(
            "Scheduled {} (supply {}, borrow {}) for pool {} from {} for {}s",
            total,
            supply_amount,
            borrow_amount,
            pool.short(),
            start_time,
            duration
        );
        for event in events {
            self.events.push(event);
        }
        Ok(())
    }

    /// Add reward to the live windows of `pool` without resetting progress
    pub fn distribute_rewards_more(
        &mut self,
        pool: &PoolId,
        supply_add: U256,
        borrow_add: U256,
        now: u64,
    ) -> Result<()> {
        let mut staged = self.enabled_pool(pool)?.clone();
        let additions = [
            (DistributionKind::Supply, supply_add),
            (DistributionKind::Borrow, borrow_add),
        ];
        let total = nonzero_total(&additions)?;

        let mut budget = self.ledger.budget.clone();
        budget.allocate(total)?;

        let mut events = Vec::new();
        for (kind, amount) in additions {
            if amount.is_zero() {
                continue;
            }
            let rewards = staged.kind_mut(kind);
            rewards.checkpoint(now)?;
            rewards.distribution.top_up(pool, amount, now)?;
            events.push(RewardEvent::DistributionToppedUp {
                pool: *pool,
                kind,
                amount,
                reward_rate: rewards.distribution.reward_rate,
                timestamp: now,
            });
        }

        self.commit_pool(*pool, staged);
        self.ledger.budget = budget;
        tracing::info!(
            "Topped up pool {} by {} (supply {}, borrow {})",
            pool.short(),
            total,
            supply_add,
            borrow_add
        );
        for event in events {
            self.events.push(event);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCRUAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bring one side's index up to `now`
    pub fn checkpoint(&mut self, pool: &PoolId, kind: DistributionKind, now: u64) -> Result<()> {
        let mut staged = self.ledger.require_pool(pool)?.clone();
        staged.kind_mut(kind).checkpoint(now)?;
        tracing::debug!(
            "Checkpoint {} {} at {}: index {}",
            pool.short(),
            kind,
            now,
            staged.kind(kind).distribution.reward_per_token_stored
        );
        self.commit_pool(*pool, staged);
        Ok(())
    }

    /// Reward `account` could harvest from one side of `pool` at `now`
    pub fn earned(&self, pool: &PoolId, account: &AccountId, kind: DistributionKind, now: u64) -> Result<U256> {
        self.ledger.require_pool(pool)?.kind(kind).earned(account, now)
    }

    /// Reward `account` could harvest from both sides of `pool` at `now`
    pub fn earned_total(&self, pool: &PoolId, account: &AccountId, now: u64) -> Result<U256> {
        let rewards = self.ledger.require_pool(pool)?;
        safe_add(
            rewards.supply.earned(account, now)?,
            rewards.borrow.earned(account, now)?,
        )
    }

    /// Fold pending reward and refresh `account`'s stake and boost.
    ///
    /// Returns the new effective balance.
    pub fn settle(&mut self, pool: &PoolId, kind: DistributionKind, account: &AccountId, now: u64) -> Result<U256> {
        let mut staged = self.ledger.require_pool(pool)?.clone();
        let effective = self.settle_staged(pool, &mut staged, kind, account, now)?;
        self.commit_pool(*pool, staged);
        self.record_settlement(pool, kind, account, effective, now);
        Ok(effective)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BALANCE-CHANGE HOOKS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Call after `account`'s pool-share balance changed
    pub fn on_supply_change(&mut self, pool: &PoolId, account: &AccountId, now: u64) -> Result<U256> {
        self.settle(pool, DistributionKind::Supply, account, now)
    }

    /// Call after `account`'s borrow balance changed
    pub fn on_borrow_change(&mut self, pool: &PoolId, account: &AccountId, now: u64) -> Result<U256> {
        self.settle(pool, DistributionKind::Borrow, account, now)
    }

    /// Call after pool shares moved from `from` to `to`
    pub fn on_transfer(&mut self, pool: &PoolId, from: &AccountId, to: &AccountId, now: u64) -> Result<()> {
        let kind = DistributionKind::Supply;
        let mut staged = self.ledger.require_pool(pool)?.clone();
        let from_effective = self.settle_staged(pool, &mut staged, kind, from, now)?;
        let to_effective = self.settle_staged(pool, &mut staged, kind, to, now)?;
        self.commit_pool(*pool, staged);
        self.record_settlement(pool, kind, from, from_effective, now);
        self.record_settlement(pool, kind, to, to_effective, now);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HARVEST
    // ═══════════════════════════════════════════════════════════════════════════

    /// Settle both sides of `pool` for `account` and pay what it earned
    pub fn harvest_for(&mut self, pool: &PoolId, account: &AccountId, now: u64) -> Result<U256> {
        self.harvest_all(std::slice::from_ref(pool), account, now)
    }

    /// Harvest several pools in one payment
    pub fn harvest_all(&mut self, pools: &[PoolId], account: &AccountId, now: u64) -> Result<U256> {
        let unique: BTreeSet<PoolId> = pools.iter().copied().collect();

        let mut staged = Vec::with_capacity(unique.len());
        let mut settlements = Vec::new();
        let mut total = U256::zero();
        for pool in &unique {
            let mut rewards = self.ledger.require_pool(pool)?.clone();
            for kind in DistributionKind::ALL {
                let effective = self.settle_staged(pool, &mut rewards, kind, account, now)?;
                settlements.push((*pool, kind, effective));
                total = safe_add(total, rewards.kind_mut(kind).take_unpaid(account))?;
            }
            staged.push((*pool, rewards));
        }

        if !total.is_zero() {
            if let Err(e) = self.sink.pay(account, total) {
                tracing::warn!("Payout of {} to {} rejected: {}", total, account.short(), e);
                return Err(e);
            }
        }

        for (pool, rewards) in staged {
            self.commit_pool(pool, rewards);
        }
        for (pool, kind, effective) in settlements {
            self.record_settlement(&pool, kind, account, effective, now);
        }

        if !total.is_zero() {
            self.ledger.budget.release(total);
            self.events.push(RewardEvent::RewardPaid {
                pools: unique.into_iter().collect(),
                account: *account,
                amount: total,
                timestamp: now,
            });
            tracing::info!("Harvested {} for {}", total, account.short());
        }
        Ok(total)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VIEWS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Distribution of one side of `pool`
    pub fn distribution(&self, pool: &PoolId, kind: DistributionKind) -> Result<&PoolDistribution> {
        Ok(&self.ledger.require_pool(pool)?.kind(kind).distribution)
    }

    /// Window state of one side of `pool` at `now`
    pub fn distribution_state(&self, pool: &PoolId, kind: DistributionKind, now: u64) -> Result<DistributionState> {
        Ok(self.distribution(pool, kind)?.state(now))
    }

    /// Stored snapshot for `account`
    pub fn snapshot(&self, pool: &PoolId, kind: DistributionKind, account: &AccountId) -> Result<AccountRewardSnapshot> {
        Ok(self.ledger.require_pool(pool)?.kind(kind).snapshot(account))
    }

    /// Summary of `pool` at `now`
    pub fn pool_stats(&self, pool: &PoolId, now: u64) -> Result<PoolStats> {
        let rewards = self.ledger.require_pool(pool)?;
        let stats = |kind: DistributionKind| -> Result<KindStats> {
            let side = rewards.kind(kind);
            let accrual = side.distribution.accrue(side.total_effective, now)?;
            Ok(KindStats {
                state: side.distribution.state(now),
                reward_rate: side.distribution.reward_rate,
                total_effective: side.total_effective,
                reward_per_token: accrual.reward_per_token,
                distributed: safe_add(side.distribution.distributed, accrual.emitted)?,
                remaining: side.distribution.remaining_reward(now)?,
                accounts: side.accounts.len(),
            })
        };
        Ok(PoolStats {
            pool: *pool,
            enabled: rewards.enabled,
            supply: stats(DistributionKind::Supply)?,
            borrow: stats(DistributionKind::Borrow)?,
        })
    }

    /// Registered pools in id order
    pub fn pools(&self) -> Vec<PoolId> {
        self.ledger.pools.keys().copied().collect()
    }

    /// Reward budget
    pub fn budget(&self) -> &RewardBudget {
        &self.ledger.budget
    }

    /// Active boost parameters
    pub fn boost(&self) -> &BoostConfig {
        &self.ledger.boost
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Full persisted state
    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    /// Events recorded since the last drain
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Remove and return recorded events
    pub fn take_events(&mut self) -> Vec<RewardEvent> {
        self.events.drain()
    }

    /// Stake source
    pub fn stake_source(&self) -> &S {
        &self.stake
    }

    /// Escrow source
    pub fn escrow(&self) -> &V {
        &self.escrow
    }

    /// Reward sink
    pub fn sink(&self) -> &R {
        &self.sink
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    fn enabled_pool(&self, pool: &PoolId) -> Result<&PoolRewards> {
        match self.ledger.pool(pool) {
            Some(rewards) if rewards.enabled => Ok(rewards),
            _ => Err(Error::DisabledToken(pool.to_hex())),
        }
    }

    fn check_reserves(&self, budget: &RewardBudget) -> Result<()> {
        if let Some(available) = self.sink.reserves()? {
            let required = budget.committed()?;
            if available < required {
                return Err(Error::NotEnoughBalance { required, available });
            }
        }
        Ok(())
    }

    fn settle_staged(
        &self,
        pool: &PoolId,
        staged: &mut PoolRewards,
        kind: DistributionKind,
        account: &AccountId,
        now: u64,
    ) -> Result<U256> {
        let staked = self.stake.staked_balance(pool, kind, account)?;
        let ve_balance = self.escrow.ve_balance(account)?;
        let extra = self.ledger.boost.extra_for(staked, ve_balance)?;

        let rewards = staged.kind_mut(kind);
        rewards.checkpoint(now)?;
        rewards.settle(account, staked, extra)
    }

    fn commit_pool(&mut self, pool: PoolId, rewards: PoolRewards) {
        self.ledger.pools.insert(pool, rewards);
    }

    fn record_settlement(
        &mut self,
        pool: &PoolId,
        kind: DistributionKind,
        account: &AccountId,
        effective_balance: U256,
        now: u64,
    ) {
        tracing::debug!(
            "Settled {} on {} {}: effective {}",
            account.short(),
            pool.short(),
            kind,
            effective_balance
        );
        self.events.push(RewardEvent::AccountSettled {
            pool: *pool,
            kind,
            account: *account,
            effective_balance,
            timestamp: now,
        });
    }
}

/// Checked sum of per-kind amounts, rejecting an all-zero request
fn nonzero_total(amounts: &[(DistributionKind, U256)]) -> Result<U256> {
    let total = amounts
        .iter()
        .try_fold(U256::zero(), |acc, (_, amount)| safe_add(acc, *amount))?;
    if total.is_zero() {
        return Err(Error::InvalidParameter {
            name: "amount".into(),
            reason: "at least one side needs a positive amount".into(),
        });
    }
    Ok(total)
}
