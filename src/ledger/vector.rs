//! Collateral vectors: sparse token → amount ledgers as parallel arrays.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::crypto::TokenId;
use crate::utils::math::{checked_sum, serde_u256, U256};

/// Parallel `tokens` / `amounts` sequences. `amounts[i]` belongs to `tokens[i]`.
///
/// The fields are public because callers routinely hand over arrays built
/// elsewhere; [`CollateralVector::validate`] is what every merge runs first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralVector {
    /// Token identifiers, unique within the vector
    pub tokens: Vec<TokenId>,
    /// Amount held per token
    #[serde(with = "serde_u256::vec")]
    pub amounts: Vec<U256>,
}

impl CollateralVector {
    /// Build a vector, rejecting mismatched lengths and duplicate tokens
    pub fn new(tokens: Vec<TokenId>, amounts: Vec<U256>) -> Result<Self> {
        let vector = Self { tokens, amounts };
        vector.validate()?;
        Ok(vector)
    }

    /// The empty vector
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(token, amount)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TokenId, U256)>,
    {
        let (tokens, amounts) = pairs.into_iter().unzip();
        Self::new(tokens, amounts)
    }

    /// Check the length and uniqueness invariants
    pub fn validate(&self) -> Result<()> {
        if self.tokens.len() != self.amounts.len() {
            return Err(Error::MismatchedLengths {
                tokens: self.tokens.len(),
                amounts: self.amounts.len(),
            });
        }
        self.index()?;
        Ok(())
    }

    /// Token → position lookup; fails on the first duplicate
    pub(crate) fn index(&self) -> Result<HashMap<TokenId, usize>> {
        let mut index = HashMap::with_capacity(self.tokens.len());
        for (i, token) in self.tokens.iter().enumerate() {
            if index.insert(*token, i).is_some() {
                return Err(Error::DuplicateToken(token.to_hex()));
            }
        }
        Ok(index)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when the vector holds no tokens at all
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Position of `token`, if present
    pub fn index_of(&self, token: &TokenId) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }

    /// Amount recorded for `token`; `None` means the token is absent,
    /// which is distinct from a zero-amount entry
    pub fn amount_for(&self, token: &TokenId) -> Option<U256> {
        self.index_of(token).map(|i| self.amounts[i])
    }

    /// True if `token` has an entry (zero or not)
    pub fn contains(&self, token: &TokenId) -> bool {
        self.index_of(token).is_some()
    }

    /// Iterate `(token, amount)` pairs in vector order
    pub fn iter(&self) -> impl Iterator<Item = (&TokenId, &U256)> {
        self.tokens.iter().zip(self.amounts.iter())
    }

    /// Checked sum of all amounts
    pub fn total(&self) -> Result<U256> {
        checked_sum(&self.amounts)
    }

    /// True if every amount is zero (vacuously true when empty)
    pub fn is_all_zero(&self) -> bool {
        self.amounts.iter().all(|a| a.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(n: u64) -> TokenId {
        TokenId::from_low_u64(n)
    }

    #[test]
    fn test_new_validates_lengths() {
        let err = CollateralVector::new(vec![tok(1), tok(2)], vec![U256::one()]).unwrap_err();
        assert_eq!(err, Error::MismatchedLengths { tokens: 2, amounts: 1 });
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let err = CollateralVector::new(vec![tok(1), tok(1)], vec![U256::one(), U256::one()])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateToken(_)));
    }

    #[test]
    fn test_lookups_distinguish_zero_from_absent() {
        let v = CollateralVector::from_pairs(vec![(tok(1), U256::zero()), (tok(2), U256::from(5u64))])
            .unwrap();
        assert_eq!(v.amount_for(&tok(1)), Some(U256::zero()));
        assert_eq!(v.amount_for(&tok(3)), None);
        assert_eq!(v.index_of(&tok(2)), Some(1));
        assert!(v.contains(&tok(1)));
        assert!(!v.is_all_zero());
        assert_eq!(v.total().unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_json_shape() {
        let v = CollateralVector::from_pairs(vec![(tok(1), U256::from(1420u64))]).unwrap();
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["amounts"][0], "1420");
        let back: CollateralVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
