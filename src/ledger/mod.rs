//! Sparse ledger merge engine.
//!
//! - `vector`: the `CollateralVector` value type
//! - `merge`: `sum`, `sub`, `left_sum`, `left_sub`, `densify`
//! - `whitelist`: the recognised-token universe for dense mode

pub mod merge;
pub mod vector;
pub mod whitelist;

pub use merge::*;
pub use vector::*;
pub use whitelist::*;
