//! Integration tests for colledger.
//!
//! These tests drive the reward controller end to end against in-memory
//! markets, escrow and treasury, and exercise persistence and the service.

use std::sync::Arc;

use colledger::cli::{Scenario, ScenarioRunner};
use colledger::core::config::EngineConfig;
use colledger::error::Error;
use colledger::rewards::controller::Controller;
use colledger::rewards::distribution::{DistributionKind, DistributionState};
use colledger::rewards::service::RewardService;
use colledger::rewards::sources::{InMemoryMarkets, RewardTreasury, TokenBalances};
use colledger::storage::{InMemoryStore, StateManager};
use colledger::utils::constants::SECONDS_PER_DAY;
use colledger::utils::crypto::{AccountId, PoolId};
use colledger::utils::math::{pow10, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

type TestController = Controller<Arc<InMemoryMarkets>, Arc<TokenBalances>, RewardTreasury>;

const T0: u64 = 1_700_000_000;

struct Harness {
    markets: Arc<InMemoryMarkets>,
    escrow: Arc<TokenBalances>,
    reward: Arc<TokenBalances>,
    controller: TestController,
}

fn config() -> EngineConfig {
    EngineConfig::default().with_duration_bounds(10, 365 * SECONDS_PER_DAY)
}

fn minting_harness() -> Harness {
    let markets = Arc::new(InMemoryMarkets::new());
    let escrow = Arc::new(TokenBalances::new());
    let reward = Arc::new(TokenBalances::new());
    let treasury = RewardTreasury::minting(reward.clone());
    let controller = Controller::new(config(), markets.clone(), escrow.clone(), treasury).unwrap();
    Harness {
        markets,
        escrow,
        reward,
        controller,
    }
}

fn transfer_harness(holder: AccountId, reserves: U256) -> Harness {
    let markets = Arc::new(InMemoryMarkets::new());
    let escrow = Arc::new(TokenBalances::new());
    let reward = Arc::new(TokenBalances::new());
    reward.mint(&holder, reserves).unwrap();
    let treasury = RewardTreasury::transfer_from(reward.clone(), holder);
    let controller = Controller::new(config(), markets.clone(), escrow.clone(), treasury).unwrap();
    Harness {
        markets,
        escrow,
        reward,
        controller,
    }
}

fn e18(n: u64) -> U256 {
    U256::from(n) * pow10(18)
}

fn pool() -> PoolId {
    PoolId::from_label("usdc-pool")
}

fn acct(label: &str) -> AccountId {
    AccountId::from_label(label)
}

impl Harness {
    fn supply(&mut self, account: &AccountId, amount: U256, now: u64) {
        self.markets.supply(&pool(), account, amount).unwrap();
        self.controller.on_supply_change(&pool(), account, now).unwrap();
    }

    fn borrow(&mut self, account: &AccountId, amount: U256, now: u64) {
        self.markets.borrow(&pool(), account, amount).unwrap();
        self.controller.on_borrow_change(&pool(), account, now).unwrap();
    }

    fn open_pool(&mut self, budget: U256) {
        self.controller.register_pool(pool(), T0).unwrap();
        self.controller.set_token_distribution(budget, T0).unwrap();
    }

    fn supply_earned(&self, account: &AccountId, now: u64) -> U256 {
        self.controller
            .earned(&pool(), account, DistributionKind::Supply, now)
            .unwrap()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCRUAL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_thirty_day_window_first_day() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(300));

    h.supply(&alice, e18(1), T0);

    let start = T0 + 10;
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(200), e18(100), start, 30 * SECONDS_PER_DAY, T0)
        .unwrap();

    let expected = U256::from_dec_str("6666666666666624000").unwrap();
    assert_eq!(h.supply_earned(&alice, start + SECONDS_PER_DAY), expected);
    // no borrowers: the borrow side streams to nobody
    assert_eq!(
        h.controller
            .earned(&pool(), &alice, DistributionKind::Borrow, start + SECONDS_PER_DAY)
            .unwrap(),
        U256::zero()
    );
    assert_eq!(
        h.controller.earned_total(&pool(), &alice, start + SECONDS_PER_DAY).unwrap(),
        expected
    );
}

#[test]
fn test_nothing_accrues_before_start() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(10));
    h.supply(&alice, e18(1), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(10), U256::zero(), T0 + 100, 1000, T0)
        .unwrap();

    assert_eq!(
        h.controller.distribution_state(&pool(), DistributionKind::Supply, T0 + 50).unwrap(),
        DistributionState::Scheduled
    );
    assert!(h.supply_earned(&alice, T0 + 100).is_zero());
    assert_eq!(h.supply_earned(&alice, T0 + 101), pow10(16));
}

#[test]
fn test_earned_sums_to_emitted_reward() {
    let mut h = minting_harness();
    let stakers = [
        (acct("a"), U256::from(100_000_000_000_000_000u64)),
        (acct("b"), U256::from(300_000_000_000_000_001u64)),
        (acct("c"), U256::from(499_999_999_999_999_997u64)),
    ];
    h.open_pool(e18(1000));
    for (account, amount) in &stakers {
        h.supply(account, *amount, T0);
    }

    let start = T0 + 1;
    let duration = 7 * SECONDS_PER_DAY + 13;
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), start, duration, T0)
        .unwrap();

    for now in [start + 1, start + 3_333, start + SECONDS_PER_DAY, start + duration, start + duration + 99] {
        let emitted = h.controller.pool_stats(&pool(), now).unwrap().supply.distributed;
        let earned = stakers
            .iter()
            .fold(U256::zero(), |acc, (account, _)| acc + h.supply_earned(account, now));

        assert!(earned <= emitted, "over-allocated at {}", now);
        assert!(emitted - earned <= U256::from(stakers.len()), "lost {} at {}", emitted - earned, now);
    }
}

#[test]
fn test_reward_per_token_is_monotonic() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let bob = acct("bob");
    h.open_pool(e18(2000));
    h.supply(&alice, e18(3), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    let mut previous = h.controller.pool_stats(&pool(), T0).unwrap().supply.reward_per_token;
    for step in 1..=12u64 {
        let now = T0 + step * 100;
        match step {
            3 => h.supply(&bob, e18(7), now),
            5 => h
                .controller
                .distribute_rewards_more(&pool(), e18(500), U256::zero(), now)
                .unwrap(),
            8 => {
                h.markets.redeem(&pool(), &alice, e18(3)).unwrap();
                h.controller.on_supply_change(&pool(), &alice, now).unwrap();
            }
            _ => h.controller.checkpoint(&pool(), DistributionKind::Supply, now).unwrap(),
        }
        let index = h.controller.pool_stats(&pool(), now).unwrap().supply.reward_per_token;
        assert!(index >= previous, "index went backwards at step {}", step);
        previous = index;
    }
}

#[test]
fn test_balance_changes_apply_from_settlement() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let bob = acct("bob");
    h.open_pool(e18(1000));
    h.supply(&alice, e18(1), T0);
    h.supply(&bob, e18(1), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    // alice doubles the stake halfway through
    h.supply(&alice, e18(1), T0 + 500);
    let end = T0 + 1000;

    // first half 250 each; second half split 2:1
    let alice_earned = h.supply_earned(&alice, end);
    let bob_earned = h.supply_earned(&bob, end);
    assert!(alice_earned <= e18(250) + e18(500) * 2 / 3);
    assert!(alice_earned + U256::from(2u64) >= e18(250) + e18(500) * 2 / 3);
    assert!(bob_earned <= e18(250) + e18(500) / 3);
    assert!(bob_earned + U256::from(2u64) >= e18(250) + e18(500) / 3);
}

#[test]
fn test_transfer_settles_both_sides() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let bob = acct("bob");
    h.open_pool(e18(1000));
    h.supply(&alice, e18(2), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    h.markets.transfer(&pool(), &alice, &bob, e18(1)).unwrap();
    h.controller.on_transfer(&pool(), &alice, &bob, T0 + 400).unwrap();

    assert_eq!(h.supply_earned(&alice, T0 + 400), e18(400));
    assert!(h.supply_earned(&bob, T0 + 400).is_zero());
    assert_eq!(h.supply_earned(&alice, T0 + 1000), e18(700));
    assert_eq!(h.supply_earned(&bob, T0 + 1000), e18(300));
}

#[test]
fn test_borrow_side_accrues_independently() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let bob = acct("bob");
    h.open_pool(e18(300));
    h.supply(&alice, e18(1), T0);
    h.borrow(&bob, e18(5), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(100), e18(200), T0, 100, T0)
        .unwrap();

    let end = T0 + 100;
    assert_eq!(h.controller.earned_total(&pool(), &alice, end).unwrap(), e18(100));
    assert_eq!(h.controller.earned_total(&pool(), &bob, end).unwrap(), e18(200));
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-UP & RE-ARM TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_top_up_mid_window() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(1500));
    h.supply(&alice, e18(1), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();
    h.controller
        .distribute_rewards_more(&pool(), e18(500), U256::zero(), T0 + 500)
        .unwrap();

    let distribution = h.controller.distribution(&pool(), DistributionKind::Supply).unwrap();
    assert_eq!(distribution.reward_rate, e18(2));
    assert_eq!(distribution.total_amount, e18(1500));
    assert_eq!(distribution.end_time, T0 + 1000);

    assert_eq!(h.supply_earned(&alice, T0 + 500), e18(500));
    assert_eq!(h.supply_earned(&alice, T0 + 1000), e18(1500));
    assert!(h.controller.budget().unallocated.is_zero());
}

#[test]
fn test_top_up_before_start_spreads_over_full_window() {
    let mut h = minting_harness();
    h.open_pool(e18(2000));

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0 + 100, 1000, T0)
        .unwrap();
    h.controller
        .distribute_rewards_more(&pool(), e18(1000), U256::zero(), T0 + 50)
        .unwrap();

    let distribution = h.controller.distribution(&pool(), DistributionKind::Supply).unwrap();
    assert_eq!(distribution.reward_rate, e18(2));
    assert_eq!(distribution.start_time, T0 + 100);
}

#[test]
fn test_top_up_after_expiry_fails() {
    let mut h = minting_harness();
    h.open_pool(e18(2000));
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    let before = h.controller.ledger().clone();
    let result = h
        .controller
        .distribute_rewards_more(&pool(), e18(1), U256::zero(), T0 + 1000);
    assert!(matches!(result, Err(Error::DistributionExpired(_))));
    assert_eq!(h.controller.ledger(), &before);
}

#[test]
fn test_rearm_keeps_accrued_index() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(2000));
    h.supply(&alice, e18(1), T0);

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    // still active
    let result = h
        .controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0 + 500, 1000, T0 + 500);
    assert!(matches!(result, Err(Error::InvalidParameter { .. })));

    let second = T0 + 1100;
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), second, 1000, T0 + 1050)
        .unwrap();

    // the gap between windows earns nothing
    assert_eq!(h.supply_earned(&alice, second), e18(1000));
    assert_eq!(h.supply_earned(&alice, second + 1000), e18(2000));
}

// ═══════════════════════════════════════════════════════════════════════════════
// BOOST TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_boost_is_sticky_until_settlement() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let bob = acct("bob");
    h.open_pool(e18(2500));
    h.controller.set_boost(50, e18(1), T0).unwrap();

    h.escrow.mint(&alice, e18(1)).unwrap();
    h.supply(&alice, e18(1), T0);
    h.supply(&bob, e18(1), T0);

    let snapshot = h.controller.snapshot(&pool(), DistributionKind::Supply, &alice).unwrap();
    assert_eq!(snapshot.extra, pow10(17) * 5);
    assert_eq!(
        h.controller.pool_stats(&pool(), T0).unwrap().supply.total_effective,
        pow10(17) * 25
    );

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(2500), U256::zero(), T0, 1000, T0)
        .unwrap();

    // escrow drops; the boost stays until the next settlement
    h.escrow.burn(&alice, e18(1)).unwrap();
    assert_eq!(h.supply_earned(&alice, T0 + 500), e18(750));
    assert_eq!(h.supply_earned(&bob, T0 + 500), e18(500));

    h.controller
        .settle(&pool(), DistributionKind::Supply, &alice, T0 + 500)
        .unwrap();
    assert_eq!(h.supply_earned(&alice, T0 + 1000), e18(750) + e18(625));
    assert_eq!(h.supply_earned(&bob, T0 + 1000), e18(500) + e18(625));
}

#[test]
fn test_invalid_boost_rejected() {
    let mut h = minting_harness();
    assert!(matches!(
        h.controller.set_boost(10, U256::zero(), T0),
        Err(Error::InvalidRatio(_))
    ));
    let cap = h.controller.config().max_boost_ratio_pct;
    assert!(matches!(
        h.controller.set_boost(cap + 1, U256::one(), T0),
        Err(Error::InvalidRatio(_))
    ));
    h.controller.set_boost(0, U256::zero(), T0).unwrap();
    assert!(!h.controller.boost().is_enabled());
}

// ═══════════════════════════════════════════════════════════════════════════════
// HARVEST TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_harvest_mints_and_resets() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(1000));
    h.supply(&alice, e18(1), T0);
    h.borrow(&alice, e18(1), T0);
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(600), e18(400), T0, 1000, T0)
        .unwrap();

    let paid = h.controller.harvest_for(&pool(), &alice, T0 + 2000).unwrap();
    assert_eq!(paid, e18(1000));
    assert_eq!(h.reward.balance_of(&alice).unwrap(), e18(1000));
    assert!(h.controller.earned_total(&pool(), &alice, T0 + 3000).unwrap().is_zero());
    assert!(h.controller.budget().outstanding.is_zero());
    assert_eq!(h.controller.events().filter_by_type("RewardPaid").len(), 1);

    // nothing left: no payout, no event
    assert!(h.controller.harvest_for(&pool(), &alice, T0 + 3000).unwrap().is_zero());
    assert_eq!(h.controller.events().filter_by_type("RewardPaid").len(), 1);
}

#[test]
fn test_harvest_all_pays_once() {
    let mut h = minting_harness();
    let alice = acct("alice");
    let other = PoolId::from_label("dai-pool");
    h.open_pool(e18(300));
    h.controller.register_pool(other, T0).unwrap();

    h.supply(&alice, e18(1), T0);
    h.markets.supply(&other, &alice, e18(1)).unwrap();
    h.controller.on_supply_change(&other, &alice, T0).unwrap();

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0, 100, T0)
        .unwrap();
    h.controller
        .distribute_rewards_2_pool(&other, e18(200), U256::zero(), T0, 100, T0)
        .unwrap();

    let paid = h
        .controller
        .harvest_all(&[pool(), other, pool()], &alice, T0 + 100)
        .unwrap();
    assert_eq!(paid, e18(300));
    assert_eq!(h.reward.balance_of(&alice).unwrap(), e18(300));
    assert_eq!(h.controller.events().filter_by_type("RewardPaid").len(), 1);
}

#[test]
fn test_failed_payout_leaves_state_untouched() {
    let treasury = acct("treasury");
    let mut h = transfer_harness(treasury, e18(1000));
    let alice = acct("alice");
    h.open_pool(e18(1000));
    h.supply(&alice, e18(1), T0);
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();

    // reserves drained outside the controller
    h.reward.transfer(&treasury, &acct("elsewhere"), e18(999)).unwrap();

    let ledger = h.controller.ledger().clone();
    let events = h.controller.events().len();
    let result = h.controller.harvest_for(&pool(), &alice, T0 + 1000);

    assert!(matches!(result, Err(Error::TransferFailed(_))));
    assert_eq!(h.controller.ledger(), &ledger);
    assert_eq!(h.controller.events().len(), events);
    assert_eq!(h.supply_earned(&alice, T0 + 1000), e18(1000));
    assert!(h.reward.balance_of(&alice).unwrap().is_zero());
}

#[test]
fn test_transfer_treasury_pays_from_reserves() {
    let treasury = acct("treasury");
    let mut h = transfer_harness(treasury, e18(100));
    let alice = acct("alice");
    h.open_pool(e18(100));
    h.supply(&alice, e18(1), T0);
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0, 100, T0)
        .unwrap();

    let paid = h.controller.harvest_for(&pool(), &alice, T0 + 40).unwrap();
    assert_eq!(paid, e18(40));
    assert_eq!(h.reward.balance_of(&treasury).unwrap(), e18(60));
    assert_eq!(h.controller.budget().outstanding, e18(60));
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAILURE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_budget_limits() {
    let treasury = acct("treasury");
    let mut h = transfer_harness(treasury, e18(100));
    h.controller.register_pool(pool(), T0).unwrap();

    assert!(matches!(
        h.controller.set_token_distribution(e18(101), T0),
        Err(Error::NotEnoughBalance { .. })
    ));
    h.controller.set_token_distribution(e18(60), T0).unwrap();

    let result = h
        .controller
        .distribute_rewards_2_pool(&pool(), e18(40), e18(40), T0, 100, T0);
    assert!(matches!(result, Err(Error::NotEnoughBalance { .. })));
    assert_eq!(h.controller.budget().unallocated, e18(60));
    assert_eq!(
        h.controller.distribution_state(&pool(), DistributionKind::Supply, T0).unwrap(),
        DistributionState::Unconfigured
    );

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(40), e18(20), T0, 100, T0)
        .unwrap();
    assert!(matches!(
        h.controller.distribute_rewards_more(&pool(), e18(1), U256::zero(), T0 + 1),
        Err(Error::NotEnoughBalance { .. })
    ));
}

#[test]
fn test_schedule_parameter_checks() {
    let mut h = minting_harness();
    h.open_pool(e18(10));

    let cases = [
        (e18(1), U256::zero(), T0 - 1, 100),
        (e18(1), U256::zero(), T0, 5),
        (e18(1), U256::zero(), T0, 366 * SECONDS_PER_DAY),
        (U256::zero(), U256::zero(), T0, 100),
        (U256::from(99u64), U256::zero(), T0, 100),
    ];
    for (supply, borrow, start, duration) in cases {
        let result = h
            .controller
            .distribute_rewards_2_pool(&pool(), supply, borrow, start, duration, T0);
        assert!(
            matches!(result, Err(Error::InvalidParameter { .. })),
            "start {} duration {} accepted",
            start,
            duration
        );
    }
    assert_eq!(h.controller.budget().unallocated, e18(10));
}

#[test]
fn test_disabled_pool_keeps_accruing() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(300));
    h.supply(&alice, e18(1), T0);

    let unknown = PoolId::from_label("unknown");
    assert!(matches!(
        h.controller
            .distribute_rewards_2_pool(&unknown, e18(1), U256::zero(), T0, 100, T0),
        Err(Error::DisabledToken(_))
    ));
    assert!(matches!(
        h.controller.earned(&unknown, &alice, DistributionKind::Supply, T0),
        Err(Error::DisabledToken(_))
    ));

    h.controller
        .distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0, 100, T0)
        .unwrap();
    h.controller.set_pool_enabled(&pool(), false, T0 + 10).unwrap();

    assert!(matches!(
        h.controller.distribute_rewards_more(&pool(), e18(1), U256::zero(), T0 + 20),
        Err(Error::DisabledToken(_))
    ));
    assert_eq!(h.controller.harvest_for(&pool(), &alice, T0 + 100).unwrap(), e18(100));

    h.controller.set_pool_enabled(&pool(), true, T0 + 200).unwrap();
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0 + 200, 100, T0 + 200)
        .unwrap();
    assert!(h.controller.pool_stats(&pool(), T0 + 200).unwrap().supply.state.is_live());
}

#[test]
fn test_duplicate_pool_rejected() {
    let mut h = minting_harness();
    h.controller.register_pool(pool(), T0).unwrap();
    assert!(matches!(
        h.controller.register_pool(pool(), T0),
        Err(Error::InvalidParameter { .. })
    ));
    assert_eq!(h.controller.pools(), vec![pool()]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPOSABILITY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reward_token_staked_in_second_controller() {
    // first controller mints the token the second one stakes
    let mut issuer = minting_harness();
    let alice = acct("alice");
    issuer.open_pool(e18(100));
    issuer.supply(&alice, e18(1), T0);
    issuer
        .controller
        .distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0, 100, T0)
        .unwrap();

    let mut staking = minting_harness();
    let sherx_pool = PoolId::from_label("sherx");
    staking
        .markets
        .attach(sherx_pool, DistributionKind::Supply, issuer.reward.clone())
        .unwrap();
    staking.controller.register_pool(sherx_pool, T0).unwrap();
    staking.controller.set_token_distribution(e18(50), T0).unwrap();
    staking
        .controller
        .distribute_rewards_2_pool(&sherx_pool, e18(50), U256::zero(), T0 + 100, 100, T0)
        .unwrap();

    issuer.controller.harvest_for(&pool(), &alice, T0 + 100).unwrap();
    staking
        .controller
        .on_supply_change(&sherx_pool, &alice, T0 + 100)
        .unwrap();

    assert_eq!(
        staking.controller.snapshot(&sherx_pool, DistributionKind::Supply, &alice).unwrap().staked,
        e18(100)
    );
    assert_eq!(
        staking
            .controller
            .earned(&sherx_pool, &alice, DistributionKind::Supply, T0 + 200)
            .unwrap(),
        e18(50)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE & SERVICE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_ledger_survives_restart() {
    let mut h = minting_harness();
    let alice = acct("alice");
    h.open_pool(e18(1000));
    h.supply(&alice, e18(1), T0);
    h.controller
        .distribute_rewards_2_pool(&pool(), e18(1000), U256::zero(), T0, 1000, T0)
        .unwrap();
    h.controller
        .checkpoint(&pool(), DistributionKind::Supply, T0 + 300)
        .unwrap();

    let manager = StateManager::new(InMemoryStore::new());
    manager.save_ledger(h.controller.ledger(), T0 + 300).unwrap();
    manager.append_events(h.controller.events().events()).unwrap();

    let ledger = manager.load_ledger().unwrap().unwrap();
    assert_eq!(ledger.state_hash(), h.controller.ledger().state_hash());
    assert_eq!(manager.load_events().unwrap().len(), h.controller.events().len());

    let restored = Controller::with_ledger(
        config(),
        ledger,
        h.markets.clone(),
        h.escrow.clone(),
        RewardTreasury::minting(h.reward.clone()),
    )
    .unwrap();
    assert_eq!(
        restored
            .earned(&pool(), &alice, DistributionKind::Supply, T0 + 700)
            .unwrap(),
        e18(700)
    );
}

#[test]
fn test_service_persists_and_drains() {
    let h = minting_harness();
    let markets = h.markets.clone();
    let service = Arc::new(RewardService::new(h.controller));
    let manager = StateManager::new(InMemoryStore::new());

    service
        .execute(|c| {
            c.register_pool(pool(), T0)?;
            c.set_token_distribution(e18(100), T0)?;
            c.distribute_rewards_2_pool(&pool(), e18(100), U256::zero(), T0, 100, T0)
        })
        .unwrap();

    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let service = service.clone();
            let markets = markets.clone();
            std::thread::spawn(move || {
                let account = AccountId::from_low_u64(i + 1);
                service
                    .execute(|c| {
                        markets.supply(&pool(), &account, e18(1))?;
                        c.on_supply_change(&pool(), &account, T0)
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let written = service.persist(&manager, T0).unwrap();
    assert_eq!(written, 3 + 4);
    assert!(service.view(|c| Ok(c.events().is_empty())).unwrap());

    let earned = service
        .view(|c| c.earned(&pool(), &AccountId::from_low_u64(1), DistributionKind::Supply, T0 + 100))
        .unwrap();
    assert_eq!(earned, e18(25));
    assert!(manager.load_ledger().unwrap().is_some());
}

#[test]
fn test_scenario_file_round_trip() {
    let json = r#"{
        "name": "two suppliers",
        "config": { "min_duration_secs": 10 },
        "steps": [
            { "at": 0,   "op": "register_pool", "pool": "usdc" },
            { "at": 0,   "op": "fund", "amount": "1000" },
            { "at": 0,   "op": "supply", "pool": "usdc", "account": "alice", "amount": "3" },
            { "at": 0,   "op": "supply", "pool": "usdc", "account": "bob", "amount": "1" },
            { "at": 0,   "op": "schedule", "pool": "usdc", "supply": "1000", "start": 0, "duration": 100 },
            { "at": 50,  "op": "top_up", "pool": "usdc", "supply": "1", "expect_error": 3001 },
            { "at": 100, "op": "observe", "pool": "usdc", "account": "alice", "kind": "supply", "expect": "750" },
            { "at": 100, "op": "observe", "pool": "usdc", "account": "bob", "expect": "250" },
            { "at": 150, "op": "harvest", "pools": ["usdc"], "account": "bob" }
        ]
    }"#;

    let report = ScenarioRunner::run(&Scenario::from_json(json).unwrap()).unwrap();
    assert!(report.passed(), "{:?}", report.failures);
    assert_eq!(report.payouts[0].amount, U256::from(250u64));
    assert_eq!(report.budget.outstanding, U256::from(750u64));
    assert_eq!(report.pools[0].supply.state, DistributionState::Expired);
}
