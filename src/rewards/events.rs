//! Reward events for state change notifications.
//!
//! The controller records one event per committed state change. Failed
//! operations record nothing.

use serde::{Deserialize, Serialize};

use crate::rewards::distribution::DistributionKind;
use crate::utils::crypto::{AccountId, PoolId, StateHash};
use crate::utils::math::{serde_u256, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All reward engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardEvent {
    /// Pool became known to the controller
    PoolRegistered {
        /// Pool
        pool: PoolId,
        /// Unix seconds
        timestamp: u64,
    },
    /// Pool was enabled or disabled
    PoolEnabledChanged {
        /// Pool
        pool: PoolId,
        /// New flag
        enabled: bool,
        /// Unix seconds
        timestamp: u64,
    },
    /// Unallocated reward budget grew
    BudgetIncreased {
        /// Added amount
        #[serde(with = "serde_u256")]
        amount: U256,
        /// Budget after the increase
        #[serde(with = "serde_u256")]
        unallocated: U256,
        /// Unix seconds
        timestamp: u64,
    },
    /// Boost parameters changed
    BoostConfigured {
        /// Extra stake at full boost, percent
        ratio_pct: u64,
        /// Escrow threshold
        #[serde(with = "serde_u256")]
        min_ve_amount: U256,
        /// Unix seconds
        timestamp: u64,
    },
    /// A fresh window was armed
    DistributionScheduled {
        /// Pool
        pool: PoolId,
        /// Side of the pool
        kind: DistributionKind,
        /// Window amount
        #[serde(with = "serde_u256")]
        amount: U256,
        /// Units per second
        #[serde(with = "serde_u256")]
        reward_rate: U256,
        /// Window start
        start_time: u64,
        /// Window end
        end_time: u64,
    },
    /// Reward was added to a live window
    DistributionToppedUp {
        /// Pool
        pool: PoolId,
        /// Side of the pool
        kind: DistributionKind,
        /// Added amount
        #[serde(with = "serde_u256")]
        amount: U256,
        /// New units per second
        #[serde(with = "serde_u256")]
        reward_rate: U256,
        /// Unix seconds
        timestamp: u64,
    },
    /// An account's snapshot was refreshed
    AccountSettled {
        /// Pool
        pool: PoolId,
        /// Side of the pool
        kind: DistributionKind,
        /// Account
        account: AccountId,
        /// New effective balance
        #[serde(with = "serde_u256")]
        effective_balance: U256,
        /// Unix seconds
        timestamp: u64,
    },
    /// Reward left the controller through the sink
    RewardPaid {
        /// Pools harvested in this payment
        pools: Vec<PoolId>,
        /// Recipient
        account: AccountId,
        /// Paid amount
        #[serde(with = "serde_u256")]
        amount: U256,
        /// Unix seconds
        timestamp: u64,
    },
}

impl RewardEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PoolRegistered { .. } => "PoolRegistered",
            Self::PoolEnabledChanged { .. } => "PoolEnabledChanged",
            Self::BudgetIncreased { .. } => "BudgetIncreased",
            Self::BoostConfigured { .. } => "BoostConfigured",
            Self::DistributionScheduled { .. } => "DistributionScheduled",
            Self::DistributionToppedUp { .. } => "DistributionToppedUp",
            Self::AccountSettled { .. } => "AccountSettled",
            Self::RewardPaid { .. } => "RewardPaid",
        }
    }

    /// Instant the event took effect; the window start for schedules
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::PoolRegistered { timestamp, .. }
            | Self::PoolEnabledChanged { timestamp, .. }
            | Self::BudgetIncreased { timestamp, .. }
            | Self::BoostConfigured { timestamp, .. }
            | Self::DistributionToppedUp { timestamp, .. }
            | Self::AccountSettled { timestamp, .. }
            | Self::RewardPaid { timestamp, .. } => *timestamp,
            Self::DistributionScheduled { start_time, .. } => *start_time,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> StateHash {
        let data = bincode::serialize(self).unwrap_or_default();
        StateHash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only list of events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<RewardEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: RewardEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[RewardEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&RewardEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append another log's events to this one
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Remove and return all events
    pub fn drain(&mut self) -> Vec<RewardEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid(amount: u64) -> RewardEvent {
        RewardEvent::RewardPaid {
            pools: vec![PoolId::from_low_u64(1)],
            account: AccountId::from_low_u64(7),
            amount: U256::from(amount),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_event_types() {
        let event = paid(5);
        assert_eq!(event.event_type(), "RewardPaid");
        assert_eq!(event.timestamp(), 1_700_000_000);

        let scheduled = RewardEvent::DistributionScheduled {
            pool: PoolId::from_low_u64(1),
            kind: DistributionKind::Supply,
            amount: U256::from(100u64),
            reward_rate: U256::one(),
            start_time: 42,
            end_time: 142,
        };
        assert_eq!(scheduled.timestamp(), 42);
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.push(paid(1));
        log.push(RewardEvent::PoolRegistered {
            pool: PoolId::from_low_u64(1),
            timestamp: 0,
        });
        log.push(paid(2));

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_by_type("RewardPaid").len(), 2);

        let drained = log.drain();
        assert_eq!(drained.len(), 3);
        assert!(log.is_empty());
    }

    #[test]
    fn test_hash_distinguishes_events() {
        assert_ne!(paid(1).hash(), paid(2).hash());
        assert_eq!(paid(1).hash(), paid(1).hash());
    }

    #[test]
    fn test_json_roundtrip() {
        let json = serde_json::to_string(&paid(9)).unwrap();
        assert!(json.contains("\"9\""));
        let back: RewardEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, paid(9));
    }
}
