//! Whitelist of recognised collateral tokens.
//!
//! Dense-mode callers size their working arrays from the whitelist and address
//! slots through `get_index`. The core only ever reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::utils::crypto::TokenId;

/// Read-only view of the recognised token universe
pub trait WhitelistSource: Send + Sync {
    /// Stable position of `token`; `DisabledToken` if unknown
    fn get_index(&self, token: &TokenId) -> Result<usize>;

    /// All recognised tokens, in index order
    fn valid_collateral(&self) -> Result<Vec<TokenId>>;
}

impl<T: WhitelistSource + ?Sized> WhitelistSource for Arc<T> {
    fn get_index(&self, token: &TokenId) -> Result<usize> {
        (**self).get_index(token)
    }

    fn valid_collateral(&self) -> Result<Vec<TokenId>> {
        (**self).valid_collateral()
    }
}

/// Ordered, append-only set of tokens; serialized as its token list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<TokenId>", into = "Vec<TokenId>")]
pub struct Whitelist {
    tokens: Vec<TokenId>,
    positions: HashMap<TokenId, usize>,
}

impl Whitelist {
    /// Create an empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an ordered token list, rejecting duplicates
    pub fn from_tokens(tokens: Vec<TokenId>) -> Result<Self> {
        let mut whitelist = Self::new();
        for token in tokens {
            whitelist.add(token)?;
        }
        Ok(whitelist)
    }

    /// Append a token; returns its index
    pub fn add(&mut self, token: TokenId) -> Result<usize> {
        if self.positions.contains_key(&token) {
            return Err(Error::DuplicateToken(token.to_hex()));
        }
        let index = self.tokens.len();
        self.tokens.push(token);
        self.positions.insert(token, index);
        Ok(index)
    }

    /// Check membership
    pub fn is_whitelisted(&self, token: &TokenId) -> bool {
        self.positions.contains_key(token)
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TryFrom<Vec<TokenId>> for Whitelist {
    type Error = Error;

    fn try_from(tokens: Vec<TokenId>) -> Result<Self> {
        Self::from_tokens(tokens)
    }
}

impl From<Whitelist> for Vec<TokenId> {
    fn from(whitelist: Whitelist) -> Self {
        whitelist.tokens
    }
}

impl WhitelistSource for Whitelist {
    fn get_index(&self, token: &TokenId) -> Result<usize> {
        self.positions
            .get(token)
            .copied()
            .ok_or_else(|| Error::DisabledToken(token.to_hex()))
    }

    fn valid_collateral(&self) -> Result<Vec<TokenId>> {
        Ok(self.tokens.clone())
    }
}
