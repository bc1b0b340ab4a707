//! # colledger
//!
//! Accounting primitives for multi-collateral lending pools.
//!
//! ## Architecture
//!
//! - **Ledger**: sparse per-token collateral vectors and their merge operations
//! - **Rewards**: time-weighted reward accrual over supply and borrow positions
//! - **Storage**: key-value persistence for ledger state and the event log
//! - **Core**: engine configuration
//! - **CLI**: scenario runner behind the `colledger` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use colledger::prelude::*;
//!
//! let merged = sum(&deposits, &withdrawals_reverted)?;
//!
//! let mut controller = Controller::new(EngineConfig::default(), markets, NoEscrow, treasury)?;
//! controller.register_pool(pool, now)?;
//! controller.set_token_distribution(budget, now)?;
//! controller.distribute_rewards_2_pool(&pool, supply_amount, borrow_amount, start, duration, now)?;
//! let paid = controller.harvest_for(&pool, &account, later)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod ledger;
pub mod rewards;
pub mod storage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::config::EngineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::ledger::{
        merge::{densify, left_sub, left_sum, sub, sum, MergeOp},
        vector::CollateralVector,
        whitelist::{Whitelist, WhitelistSource},
    };
    pub use crate::rewards::{
        boost::BoostConfig,
        controller::{Controller, PoolStats},
        distribution::{DistributionKind, DistributionState},
        service::RewardService,
        sources::{InMemoryMarkets, NoEscrow, RewardSink, RewardTreasury, StakeSource, TokenBalances, VotingEscrow},
    };
    pub use crate::utils::{
        crypto::{AccountId, Address, PoolId, StateHash, TokenId},
        math::{FixedPoint, U256},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
