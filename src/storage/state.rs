//! Engine state persistence.
//!
//! Keeps the reward ledger, engine config, collateral whitelist and event
//! history in any `StorageBackend`.

use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::error::{Error, Result};
use crate::ledger::whitelist::Whitelist;
use crate::rewards::events::RewardEvent;
use crate::rewards::ledger::RewardLedger;
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::crypto::StateHash;

/// Current on-disk layout version
pub const STATE_VERSION: u32 = 1;

const MAIN: &[u8] = b"main";

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Versioned envelope around a persisted reward ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Layout version
    pub version: u32,
    /// Unix seconds of the save
    pub saved_at: u64,
    /// Hash of `ledger` at save time
    pub state_hash: String,
    /// The ledger
    pub ledger: RewardLedger,
}

impl LedgerRecord {
    /// Wrap `ledger` for saving at `saved_at`
    pub fn new(ledger: RewardLedger, saved_at: u64) -> Self {
        Self {
            version: STATE_VERSION,
            saved_at,
            state_hash: ledger.state_hash().to_hex(),
            ledger,
        }
    }

    /// Check version and hash
    pub fn verify(&self) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(Error::Storage(format!(
                "unsupported ledger version {} (expected {})",
                self.version, STATE_VERSION
            )));
        }
        let actual: StateHash = self.ledger.state_hash();
        if actual.to_hex() != self.state_hash {
            return Err(Error::Storage(format!(
                "ledger hash mismatch: stored {}, computed {}",
                self.state_hash, actual
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// High-level state manager for the engine
pub struct StateManager<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> StateManager<B> {
    /// Create a new state manager
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REWARD LEDGER
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save the reward ledger
    pub fn save_ledger(&self, ledger: &RewardLedger, now: u64) -> Result<()> {
        let key = make_key(prefixes::LEDGER, MAIN);
        let record = LedgerRecord::new(ledger.clone(), now);
        self.store.set(&key, &record)?;
        tracing::debug!("Saved ledger {} at {}", record.state_hash, now);
        Ok(())
    }

    /// Load the reward ledger, if one was saved
    pub fn load_ledger(&self) -> Result<Option<RewardLedger>> {
        let key = make_key(prefixes::LEDGER, MAIN);
        match self.store.get::<LedgerRecord>(&key)? {
            Some(record) => {
                record.verify()?;
                Ok(Some(record.ledger))
            }
            None => Ok(None),
        }
    }

    /// Load the saved ledger or a fresh one built from `config`
    pub fn load_ledger_or_default(&self, config: &EngineConfig) -> Result<RewardLedger> {
        Ok(self
            .load_ledger()?
            .unwrap_or_else(|| RewardLedger::new(config.default_boost.clone())))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save engine configuration
    pub fn save_config(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        let key = make_key(prefixes::CONFIG, MAIN);
        self.store.set(&key, config)
    }

    /// Load engine configuration, if one was saved
    pub fn load_config(&self) -> Result<Option<EngineConfig>> {
        let key = make_key(prefixes::CONFIG, MAIN);
        let config: Option<EngineConfig> = self.store.get(&key)?;
        if let Some(config) = &config {
            config.validate()?;
        }
        Ok(config)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WHITELIST
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save the collateral whitelist
    pub fn save_whitelist(&self, whitelist: &Whitelist) -> Result<()> {
        let key = make_key(prefixes::WHITELIST, MAIN);
        self.store.set(&key, whitelist)
    }

    /// Load the collateral whitelist, empty if none was saved
    pub fn load_whitelist(&self) -> Result<Whitelist> {
        let key = make_key(prefixes::WHITELIST, MAIN);
        Ok(self.store.get(&key)?.unwrap_or_default())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Append events after those already stored; returns the new count
    pub fn append_events(&self, events: &[RewardEvent]) -> Result<u64> {
        let mut next = self.event_count()?;
        for event in events {
            let key = make_key(prefixes::EVENTS, &next.to_be_bytes());
            self.store.set(&key, event)?;
            next += 1;
        }
        Ok(next)
    }

    /// Number of stored events
    pub fn event_count(&self) -> Result<u64> {
        Ok(self.store.list_prefix(prefixes::EVENTS)?.len() as u64)
    }

    /// All stored events in append order
    pub fn load_events(&self) -> Result<Vec<RewardEvent>> {
        let mut events = Vec::new();
        for key in self.store.list_prefix(prefixes::EVENTS)? {
            if let Some(event) = self.store.get::<RewardEvent>(&key)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // UTILITY METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        self.store.backend()
    }
}
