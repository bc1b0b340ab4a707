//! Fixed-point arithmetic and 256-bit integer utilities.
//!
//! Every addition and multiplication used by the merge and accrual engines goes
//! through the checked helpers here; native wraparound is never relied on.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::SCALE_RAW;

#[allow(missing_docs, clippy::all)]
mod wide {
    uint::construct_uint! {
        /// 256-bit unsigned integer used for token amounts and reward indexes.
        pub struct U256(4);
    }
}

pub use wide::U256;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places, backed by a U256
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct FixedPoint(#[serde(with = "serde_u256")] U256);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: U256 = U256([SCALE_RAW, 0, 0, 0]);

    /// Zero value
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u64) -> Result<Self> {
        safe_mul(U256::from(value), Self::SCALE).map(Self)
    }

    /// `numerator * SCALE / denominator`, rounded down
    pub fn from_ratio(numerator: U256, denominator: U256) -> Result<Self> {
        mul_div(numerator, Self::SCALE, denominator).map(Self)
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        safe_add(self.0, other.0).map(Self)
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `amount * self / SCALE`, rounded down
    pub fn mul_amount(self, amount: U256) -> Result<U256> {
        mul_div(amount, self.0, Self::SCALE)
    }
}

impl std::fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (int, frac) = self.0.div_mod(Self::SCALE);
        write!(f, "{}.{:0>18}", int, frac.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b)
        .ok_or_else(|| Error::overflow(format!("{} + {}", a, b)))
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b)
        .ok_or_else(|| Error::overflow(format!("{} * {}", a, b)))
}

/// Safe division with zero check
pub fn safe_div(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    Ok(a / b)
}

/// Computes `(a * b) / c`, rounded down, failing on overflow of the product
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256> {
    safe_div(safe_mul(a, b)?, c)
}

/// Sum of a sequence of amounts with overflow check
pub fn checked_sum<'a, I>(values: I) -> Result<U256>
where
    I: IntoIterator<Item = &'a U256>,
{
    values
        .into_iter()
        .try_fold(U256::zero(), |acc, v| safe_add(acc, *v))
}

/// Parse a decimal string into a U256
pub fn parse_u256(s: &str) -> Result<U256> {
    let trimmed = s.trim().replace('_', "");
    U256::from_dec_str(&trimmed).map_err(|e| Error::InvalidParameter {
        name: "amount".into(),
        reason: format!("'{}' is not a decimal integer: {:?}", s, e),
    })
}

/// `10^exp` as U256 (e.g. `pow10(18)` for one 18-decimal token)
pub fn pow10(exp: usize) -> U256 {
    U256::exp10(exp)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERDE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializes a U256 as a decimal string, so JSON stays exact
pub mod serde_u256 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U256;

    /// Serialize as decimal string
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from decimal string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u256(&s).map_err(serde::de::Error::custom)
    }

    /// Same encoding for a sequence of amounts
    pub mod vec {
        use serde::ser::SerializeSeq;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::U256;

        /// Serialize each element as decimal string
        pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for v in values {
                seq.serialize_element(&v.to_string())?;
            }
            seq.end()
        }

        /// Deserialize a sequence of decimal strings
        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
            let raw = Vec::<String>::deserialize(deserializer)?;
            raw.iter()
                .map(|s| super::super::parse_u256(s).map_err(serde::de::Error::custom))
                .collect()
        }
    }
}
