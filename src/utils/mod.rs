//! Utility modules shared by the ledger and reward engines:
//! - Identifiers and state hashing
//! - 256-bit fixed-point arithmetic
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;

pub use constants::*;
pub use crypto::*;
pub use math::*;
