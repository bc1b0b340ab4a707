//! External collaborators of the accrual engine, and in-memory stand-ins.
//!
//! The engine reads staked balances and escrow balances, and pays rewards
//! through a sink. All traits take `&self` and are `Send + Sync` so one
//! instance can back several controllers (a reward token that is itself
//! staked elsewhere, for example).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::rewards::distribution::DistributionKind;
use crate::utils::crypto::{AccountId, PoolId};
use crate::utils::math::{safe_add, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of staked (supply share or borrow) balances
pub trait StakeSource: Send + Sync {
    /// Balance of `account` on one side of `pool`
    fn staked_balance(&self, pool: &PoolId, kind: DistributionKind, account: &AccountId) -> Result<U256>;

    /// Total balance on one side of `pool`
    fn total_staked(&self, pool: &PoolId, kind: DistributionKind) -> Result<U256>;
}

/// Source of voting-escrow balances used for boost
pub trait VotingEscrow: Send + Sync {
    /// Escrow balance of `account`
    fn ve_balance(&self, account: &AccountId) -> Result<U256>;
}

/// Destination of harvested rewards
pub trait RewardSink: Send + Sync {
    /// Reward tokens available for payout; `None` for a sink that mints
    fn reserves(&self) -> Result<Option<U256>>;

    /// Pay `amount` to `to`. Must either fully succeed or change nothing.
    fn pay(&self, to: &AccountId, amount: U256) -> Result<()>;
}

impl<T: StakeSource + ?Sized> StakeSource for Arc<T> {
    fn staked_balance(&self, pool: &PoolId, kind: DistributionKind, account: &AccountId) -> Result<U256> {
        (**self).staked_balance(pool, kind, account)
    }

    fn total_staked(&self, pool: &PoolId, kind: DistributionKind) -> Result<U256> {
        (**self).total_staked(pool, kind)
    }
}

impl<T: VotingEscrow + ?Sized> VotingEscrow for Arc<T> {
    fn ve_balance(&self, account: &AccountId) -> Result<U256> {
        (**self).ve_balance(account)
    }
}

impl<T: RewardSink + ?Sized> RewardSink for Arc<T> {
    fn reserves(&self) -> Result<Option<U256>> {
        (**self).reserves()
    }

    fn pay(&self, to: &AccountId, amount: U256) -> Result<()> {
        (**self).pay(to, amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BALANCES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<AccountId, U256>,
    total_supply: U256,
}

/// In-memory fungible token ledger
#[derive(Debug, Default)]
pub struct TokenBalances {
    state: RwLock<TokenState>,
}

impl TokenBalances {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`
    pub fn balance_of(&self, account: &AccountId) -> Result<U256> {
        let state = self.state.read().map_err(|_| Error::Lock)?;
        Ok(state.balances.get(account).copied().unwrap_or_default())
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Result<U256> {
        let state = self.state.read().map_err(|_| Error::Lock)?;
        Ok(state.total_supply)
    }

    /// Create `amount` new tokens for `to`
    pub fn mint(&self, to: &AccountId, amount: U256) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        let total_supply = safe_add(state.total_supply, amount)?;
        let balance = safe_add(state.balances.get(to).copied().unwrap_or_default(), amount)?;
        state.total_supply = total_supply;
        state.balances.insert(*to, balance);
        Ok(())
    }

    /// Destroy `amount` tokens held by `from`
    pub fn burn(&self, from: &AccountId, amount: U256) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        let balance = state.balances.get(from).copied().unwrap_or_default();
        if balance < amount {
            return Err(Error::NotEnoughBalance {
                required: amount,
                available: balance,
            });
        }
        state.balances.insert(*from, balance - amount);
        state.total_supply = state.total_supply.saturating_sub(amount);
        Ok(())
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: U256) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        let from_balance = state.balances.get(from).copied().unwrap_or_default();
        if from_balance < amount {
            return Err(Error::NotEnoughBalance {
                required: amount,
                available: from_balance,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = safe_add(state.balances.get(to).copied().unwrap_or_default(), amount)?;
        state.balances.insert(*from, from_balance - amount);
        state.balances.insert(*to, to_balance);
        Ok(())
    }
}

impl VotingEscrow for TokenBalances {
    fn ve_balance(&self, account: &AccountId) -> Result<U256> {
        self.balance_of(account)
    }
}

/// Escrow source for deployments without boost
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEscrow;

impl VotingEscrow for NoEscrow {
    fn ve_balance(&self, _account: &AccountId) -> Result<U256> {
        Ok(U256::zero())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Stake source backed by one token ledger per (pool, kind)
#[derive(Debug, Default)]
pub struct InMemoryMarkets {
    markets: RwLock<HashMap<(PoolId, DistributionKind), Arc<TokenBalances>>>,
}

impl InMemoryMarkets {
    /// Create with no markets
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token ledger as one side of `pool`
    pub fn attach(&self, pool: PoolId, kind: DistributionKind, token: Arc<TokenBalances>) -> Result<()> {
        let mut markets = self.markets.write().map_err(|_| Error::Lock)?;
        markets.insert((pool, kind), token);
        Ok(())
    }

    /// Token ledger for one side of `pool`, created on first use
    pub fn market(&self, pool: &PoolId, kind: DistributionKind) -> Result<Arc<TokenBalances>> {
        let mut markets = self.markets.write().map_err(|_| Error::Lock)?;
        Ok(markets
            .entry((*pool, kind))
            .or_insert_with(|| Arc::new(TokenBalances::new()))
            .clone())
    }

    fn existing(&self, pool: &PoolId, kind: DistributionKind) -> Result<Option<Arc<TokenBalances>>> {
        let markets = self.markets.read().map_err(|_| Error::Lock)?;
        Ok(markets.get(&(*pool, kind)).cloned())
    }

    /// Mint pool shares to a supplier
    pub fn supply(&self, pool: &PoolId, account: &AccountId, amount: U256) -> Result<()> {
        self.market(pool, DistributionKind::Supply)?.mint(account, amount)
    }

    /// Burn pool shares from a supplier
    pub fn redeem(&self, pool: &PoolId, account: &AccountId, amount: U256) -> Result<()> {
        self.market(pool, DistributionKind::Supply)?.burn(account, amount)
    }

    /// Move pool shares between accounts
    pub fn transfer(&self, pool: &PoolId, from: &AccountId, to: &AccountId, amount: U256) -> Result<()> {
        self.market(pool, DistributionKind::Supply)?.transfer(from, to, amount)
    }

    /// Record new debt
    pub fn borrow(&self, pool: &PoolId, account: &AccountId, amount: U256) -> Result<()> {
        self.market(pool, DistributionKind::Borrow)?.mint(account, amount)
    }

    /// Reduce debt
    pub fn repay(&self, pool: &PoolId, account: &AccountId, amount: U256) -> Result<()> {
        self.market(pool, DistributionKind::Borrow)?.burn(account, amount)
    }
}

impl StakeSource for InMemoryMarkets {
    fn staked_balance(&self, pool: &PoolId, kind: DistributionKind, account: &AccountId) -> Result<U256> {
        match self.existing(pool, kind)? {
            Some(token) => token.balance_of(account),
            None => Ok(U256::zero()),
        }
    }

    fn total_staked(&self, pool: &PoolId, kind: DistributionKind) -> Result<U256> {
        match self.existing(pool, kind)? {
            Some(token) => token.total_supply(),
            None => Ok(U256::zero()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREASURY
// ═══════════════════════════════════════════════════════════════════════════════

/// How a treasury pays out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMode {
    /// Transfer from a holder account with finite reserves
    Transfer {
        /// Account holding the reward reserves
        holder: AccountId,
    },
    /// Mint new reward tokens on payout
    Mint,
}

/// Reward sink over a `TokenBalances` ledger
#[derive(Debug, Clone)]
pub struct RewardTreasury {
    token: Arc<TokenBalances>,
    mode: PayoutMode,
}

impl RewardTreasury {
    /// Pay by transferring from `holder`
    pub fn transfer_from(token: Arc<TokenBalances>, holder: AccountId) -> Self {
        Self {
            token,
            mode: PayoutMode::Transfer { holder },
        }
    }

    /// Pay by minting
    pub fn minting(token: Arc<TokenBalances>) -> Self {
        Self {
            token,
            mode: PayoutMode::Mint,
        }
    }

    /// Underlying reward token
    pub fn token(&self) -> &Arc<TokenBalances> {
        &self.token
    }

    /// Payout mode
    pub fn mode(&self) -> PayoutMode {
        self.mode
    }
}

impl RewardSink for RewardTreasury {
    fn reserves(&self) -> Result<Option<U256>> {
        match self.mode {
            PayoutMode::Transfer { holder } => self.token.balance_of(&holder).map(Some),
            PayoutMode::Mint => Ok(None),
        }
    }

    fn pay(&self, to: &AccountId, amount: U256) -> Result<()> {
        let outcome = match self.mode {
            PayoutMode::Transfer { holder } => self.token.transfer(&holder, to, amount),
            PayoutMode::Mint => self.token.mint(to, amount),
        };
        outcome.map_err(|e| Error::TransferFailed(format!("payout of {} to {}: {}", amount, to, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(n: u64) -> AccountId {
        AccountId::from_low_u64(n)
    }

    #[test]
    fn test_token_mint_burn_transfer() {
        let token = TokenBalances::new();
        token.mint(&acct(1), U256::from(100u64)).unwrap();
        token.transfer(&acct(1), &acct(2), U256::from(40u64)).unwrap();
        token.burn(&acct(2), U256::from(10u64)).unwrap();

        assert_eq!(token.balance_of(&acct(1)).unwrap(), U256::from(60u64));
        assert_eq!(token.balance_of(&acct(2)).unwrap(), U256::from(30u64));
        assert_eq!(token.total_supply().unwrap(), U256::from(90u64));
    }

    #[test]
    fn test_token_insufficient_balance_changes_nothing() {
        let token = TokenBalances::new();
        token.mint(&acct(1), U256::from(5u64)).unwrap();
        assert!(matches!(
            token.transfer(&acct(1), &acct(2), U256::from(6u64)),
            Err(Error::NotEnoughBalance { .. })
        ));
        assert!(token.burn(&acct(2), U256::one()).is_err());
        assert_eq!(token.balance_of(&acct(1)).unwrap(), U256::from(5u64));
        assert_eq!(token.total_supply().unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_markets_as_stake_source() {
        let markets = InMemoryMarkets::new();
        let pool = PoolId::from_low_u64(9);
        markets.supply(&pool, &acct(1), U256::from(7u64)).unwrap();
        markets.borrow(&pool, &acct(1), U256::from(3u64)).unwrap();

        assert_eq!(
            markets.staked_balance(&pool, DistributionKind::Supply, &acct(1)).unwrap(),
            U256::from(7u64)
        );
        assert_eq!(
            markets.total_staked(&pool, DistributionKind::Borrow).unwrap(),
            U256::from(3u64)
        );
        assert!(markets
            .staked_balance(&PoolId::from_low_u64(10), DistributionKind::Supply, &acct(1))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_attached_token_is_shared() {
        let markets = InMemoryMarkets::new();
        let pool = PoolId::from_low_u64(9);
        let token = Arc::new(TokenBalances::new());
        markets.attach(pool, DistributionKind::Supply, token.clone()).unwrap();

        token.mint(&acct(4), U256::from(11u64)).unwrap();
        assert_eq!(
            markets.staked_balance(&pool, DistributionKind::Supply, &acct(4)).unwrap(),
            U256::from(11u64)
        );
    }

    #[test]
    fn test_treasury_modes() {
        let token = Arc::new(TokenBalances::new());
        let holder = acct(100);
        token.mint(&holder, U256::from(50u64)).unwrap();

        let treasury = RewardTreasury::transfer_from(token.clone(), holder);
        assert_eq!(treasury.reserves().unwrap(), Some(U256::from(50u64)));
        treasury.pay(&acct(1), U256::from(20u64)).unwrap();
        assert!(matches!(
            treasury.pay(&acct(1), U256::from(31u64)),
            Err(Error::TransferFailed(_))
        ));

        let minter = RewardTreasury::minting(token.clone());
        assert_eq!(minter.reserves().unwrap(), None);
        minter.pay(&acct(2), U256::from(1000u64)).unwrap();
        assert_eq!(token.balance_of(&acct(2)).unwrap(), U256::from(1000u64));
    }
}
