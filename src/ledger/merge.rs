//! Merging collateral vectors.
//!
//! `sum` / `sub` work on arbitrary sparse vectors; `left_sum` / `left_sub` keep
//! the left operand's layout, which is what a caller holding a dense
//! whitelist-ordered array wants. All four validate both inputs before doing
//! any work and return a fresh vector.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ledger::vector::CollateralVector;
use crate::ledger::whitelist::WhitelistSource;
use crate::utils::crypto::TokenId;
use crate::utils::math::{safe_add, U256};

/// Merge operation selector, used by the CLI and scenario files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOp {
    /// Union of token sets, amounts added
    Sum,
    /// Left token set, amounts subtracted with a floor at zero
    Sub,
    /// Left token set, matching amounts added
    LeftSum,
    /// Left token set, matching amounts subtracted with a floor at zero
    LeftSub,
}

impl MergeOp {
    /// Apply this operation to `a` and `b`
    pub fn apply(self, a: &CollateralVector, b: &CollateralVector) -> Result<CollateralVector> {
        match self {
            MergeOp::Sum => sum(a, b),
            MergeOp::Sub => sub(a, b),
            MergeOp::LeftSum => left_sum(a, b),
            MergeOp::LeftSub => left_sub(a, b),
        }
    }
}

impl std::str::FromStr for MergeOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sum" | "add" => Ok(MergeOp::Sum),
            "sub" | "subtract" => Ok(MergeOp::Sub),
            "left-sum" | "left_sum" => Ok(MergeOp::LeftSum),
            "left-sub" | "left_sub" => Ok(MergeOp::LeftSub),
            _ => Err(Error::InvalidParameter {
                name: "op".into(),
                reason: format!("unknown merge operation: {}", s),
            }),
        }
    }
}

/// Add two vectors.
///
/// Output order is `a`'s tokens in `a`'s order (shared tokens keep `a`'s
/// position), followed by tokens only present in `b`, in `b`'s order.
pub fn sum(a: &CollateralVector, b: &CollateralVector) -> Result<CollateralVector> {
    a.validate()?;
    b.validate()?;

    let index = a.index()?;
    let mut tokens = a.tokens.clone();
    let mut amounts = a.amounts.clone();

    for (token, amount) in b.iter() {
        match index.get(token) {
            Some(&i) => amounts[i] = safe_add(amounts[i], *amount)?,
            None => {
                tokens.push(*token);
                amounts.push(*amount);
            }
        }
    }

    Ok(CollateralVector { tokens, amounts })
}

/// Subtract `b` from `a`, flooring each amount at zero.
///
/// The result has exactly `a`'s tokens; tokens only present in `b` are dropped.
pub fn sub(a: &CollateralVector, b: &CollateralVector) -> Result<CollateralVector> {
    a.validate()?;
    b.validate()?;
    Ok(subtract_into_left(a, b, &b.index()?))
}

/// Add `b` into `a`'s layout; `b` entries without a slot in `a` are ignored.
pub fn left_sum(a: &CollateralVector, b: &CollateralVector) -> Result<CollateralVector> {
    a.validate()?;
    b.validate()?;

    let index = a.index()?;
    let mut amounts = a.amounts.clone();
    for (token, amount) in b.iter() {
        if let Some(&i) = index.get(token) {
            amounts[i] = safe_add(amounts[i], *amount)?;
        }
    }

    Ok(CollateralVector {
        tokens: a.tokens.clone(),
        amounts,
    })
}

/// Subtract `b` from `a`'s layout; `a` tokens missing from `b` subtract zero.
pub fn left_sub(a: &CollateralVector, b: &CollateralVector) -> Result<CollateralVector> {
    a.validate()?;
    b.validate()?;
    Ok(subtract_into_left(a, b, &b.index()?))
}

fn subtract_into_left(
    a: &CollateralVector,
    b: &CollateralVector,
    b_index: &HashMap<TokenId, usize>,
) -> CollateralVector {
    let amounts = a
        .iter()
        .map(|(token, amount)| match b_index.get(token) {
            Some(&j) => amount.saturating_sub(b.amounts[j]),
            None => *amount,
        })
        .collect();

    CollateralVector {
        tokens: a.tokens.clone(),
        amounts,
    }
}

/// Expand `v` into the whitelist's full ordering, zero-filling absent tokens.
///
/// Fails with `DisabledToken` if `v` holds a token the whitelist does not know.
pub fn densify<W: WhitelistSource + ?Sized>(
    whitelist: &W,
    v: &CollateralVector,
) -> Result<CollateralVector> {
    v.validate()?;

    let tokens = whitelist.valid_collateral()?;
    let mut amounts = vec![U256::zero(); tokens.len()];
    for (token, amount) in v.iter() {
        let i = whitelist.get_index(token)?;
        let slot = amounts.get_mut(i).ok_or_else(|| {
            Error::Internal(format!("whitelist index {} out of range for {}", i, token))
        })?;
        *slot = *amount;
    }

    Ok(CollateralVector { tokens, amounts })
}
