//! Engine constants and magic numbers.
//!
//! All crate-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of the reward-per-token index (1e18 scale)
pub const INDEX_DECIMALS: usize = 18;

/// Raw value of 1.0 in the reward-per-token index
pub const SCALE_RAW: u64 = 1_000_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds per hour
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Seconds per day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Shortest distribution window accepted by default - 1 hour
pub const MIN_DISTRIBUTION_DURATION_SECS: u64 = SECONDS_PER_HOUR;

/// Longest distribution window accepted by default - 4 years
pub const MAX_DISTRIBUTION_DURATION_SECS: u64 = 4 * 365 * SECONDS_PER_DAY;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOST CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Boost ratio divisor (100 = +100% of base balance)
pub const BOOST_RATIO_DIVISOR: u64 = 100;

/// Largest boost ratio accepted by default - +100%, doubles effective balance
pub const MAX_BOOST_RATIO_PCT: u64 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte length of token, pool and account addresses
pub const ADDRESS_LENGTH: usize = 20;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "COLLEDGER_";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info";
