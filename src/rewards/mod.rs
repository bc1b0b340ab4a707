//! Time-weighted reward accrual for lending pools.
//!
//! - `distribution`: reward windows and the reward-per-token index
//! - `snapshot`: what each account is owed
//! - `boost`: voting-escrow boost of effective stake
//! - `ledger`: everything a controller persists
//! - `controller`: the public operations
//! - `service`: mutex-guarded controller handle
//! - `sources`: stake, escrow and payout collaborators

pub mod boost;
pub mod controller;
pub mod distribution;
pub mod events;
pub mod ledger;
pub mod service;
pub mod snapshot;
pub mod sources;

pub use boost::*;
pub use controller::*;
pub use distribution::*;
pub use events::*;
pub use ledger::*;
pub use service::*;
pub use snapshot::*;
pub use sources::*;
