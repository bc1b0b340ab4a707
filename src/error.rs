//! Error types for the colledger engines.
//!
//! Every operation in the crate is all-or-nothing: an error returned from a
//! merge or a controller call means no persistent state was touched.

use thiserror::Error;

use crate::utils::math::U256;

/// Result type alias for colledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the colledger crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Token and amount sequences of a collateral vector differ in length
    #[error("Mismatched lengths: {tokens} tokens, {amounts} amounts")]
    MismatchedLengths {
        /// Number of tokens
        tokens: usize,
        /// Number of amounts
        amounts: usize,
    },

    /// Same token appears twice in one collateral vector
    #[error("Duplicate token: {0}")]
    DuplicateToken(String),

    /// Token or pool is not enabled for the requested operation
    #[error("Token not enabled: {0}")]
    DisabledToken(String),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Checked arithmetic would exceed 256 bits
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Distribution Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Reward reserves or budget cannot cover the promised amount
    #[error("Not enough balance: required {required}, available {available}")]
    NotEnoughBalance {
        /// Required amount
        required: U256,
        /// Available amount
        available: U256,
    },

    /// Boost parameters are inconsistent
    #[error("Invalid ratio: {0}")]
    InvalidRatio(String),

    /// Distribution window has ended; a fresh schedule is required
    #[error("Distribution expired for pool {0}")]
    DistributionExpired(String),

    /// Reward sink refused the payout
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for an overflow in the named operation
    pub fn overflow(operation: impl Into<String>) -> Self {
        Error::ArithmeticOverflow {
            operation: operation.into(),
        }
    }

    /// Returns true if the caller can retry with corrected inputs or more funds
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotEnoughBalance { .. }
                | Error::DistributionExpired(_)
                | Error::TransferFailed(_)
                | Error::InvalidParameter { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::Internal(_) | Error::ArithmeticOverflow { .. } | Error::Storage(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Ledger errors: 1xxx
            Error::MismatchedLengths { .. } => 1001,
            Error::DuplicateToken(_) => 1002,
            Error::DisabledToken(_) => 1003,

            // Arithmetic errors: 2xxx
            Error::ArithmeticOverflow { .. } => 2001,

            // Distribution errors: 3xxx
            Error::NotEnoughBalance { .. } => 3001,
            Error::InvalidRatio(_) => 3002,
            Error::DistributionExpired(_) => 3003,
            Error::TransferFailed(_) => 3004,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Config(_) => 5002,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
            Error::Lock => 9002,
            Error::Storage(_) => 9003,
        }
    }
}
