//! JSON-driven simulations of the reward engine.
//!
//! A scenario is a list of timestamped steps run against in-memory markets,
//! an escrow token and a reward token. Parties are named either by `0x` hex
//! address or by a free-form label that maps to a fixed address.
//!
//! ```json
//! {
//!   "name": "single staker",
//!   "steps": [
//!     { "at": 0,  "op": "register_pool", "pool": "usdc" },
//!     { "at": 0,  "op": "fund", "amount": "36000" },
//!     { "at": 0,  "op": "supply", "pool": "usdc", "account": "alice", "amount": "10" },
//!     { "at": 0,  "op": "schedule", "pool": "usdc", "supply": "36000", "start": 0, "duration": 3600 },
//!     { "at": 40, "op": "observe", "pool": "usdc", "account": "alice", "expect": "400" },
//!     { "at": 4000, "op": "harvest", "pools": ["usdc"], "account": "alice" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::error::{Error, Result};
use crate::rewards::controller::{Controller, PoolStats};
use crate::rewards::distribution::DistributionKind;
use crate::rewards::ledger::RewardBudget;
use crate::rewards::sources::{InMemoryMarkets, RewardTreasury, TokenBalances};
use crate::utils::crypto::Address;
use crate::utils::math::{parse_u256, serde_u256, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO FILE
// ═══════════════════════════════════════════════════════════════════════════════

/// How the simulated treasury pays rewards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PayoutSpec {
    /// Mint reward tokens on harvest
    #[default]
    Mint,
    /// Transfer from `holder`, which starts with `reserves`
    Transfer {
        /// Holder label or address
        holder: String,
        /// Starting reserves
        #[serde(with = "serde_u256")]
        reserves: U256,
    },
}

/// A simulation script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Engine configuration; defaults apply when absent
    #[serde(default)]
    pub config: Option<EngineConfig>,
    /// Treasury behaviour
    #[serde(default)]
    pub payout: PayoutSpec,
    /// Steps in time order
    pub steps: Vec<ScenarioStep>,
}

/// One timestamped action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Unix seconds
    pub at: u64,
    /// What to do
    #[serde(flatten)]
    pub action: Action,
    /// Error code the step must fail with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<u32>,
}

/// Scenario actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Action {
    /// Register a pool
    RegisterPool {
        /// Pool
        pool: String,
    },
    /// Enable or disable a pool
    SetPoolEnabled {
        /// Pool
        pool: String,
        /// New flag
        enabled: bool,
    },
    /// Grow the reward budget
    Fund {
        /// Amount
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Configure boost
    SetBoost {
        /// Percent
        ratio_pct: u64,
        /// Escrow threshold
        #[serde(with = "serde_u256")]
        min_ve_amount: U256,
    },
    /// Arm fresh windows
    Schedule {
        /// Pool
        pool: String,
        /// Supply-side amount
        #[serde(with = "serde_u256", default)]
        supply: U256,
        /// Borrow-side amount
        #[serde(with = "serde_u256", default)]
        borrow: U256,
        /// Window start
        start: u64,
        /// Window length in seconds
        duration: u64,
    },
    /// Add to live windows
    TopUp {
        /// Pool
        pool: String,
        /// Supply-side amount
        #[serde(with = "serde_u256", default)]
        supply: U256,
        /// Borrow-side amount
        #[serde(with = "serde_u256", default)]
        borrow: U256,
    },
    /// Deposit into a pool, then settle
    Supply {
        /// Pool
        pool: String,
        /// Account
        account: String,
        /// Pool shares
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Withdraw from a pool, then settle
    Redeem {
        /// Pool
        pool: String,
        /// Account
        account: String,
        /// Pool shares
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Borrow from a pool, then settle
    Borrow {
        /// Pool
        pool: String,
        /// Account
        account: String,
        /// Debt
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Repay a pool, then settle
    Repay {
        /// Pool
        pool: String,
        /// Account
        account: String,
        /// Debt
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Move pool shares, then settle both sides
    Transfer {
        /// Pool
        pool: String,
        /// Sender
        from: String,
        /// Recipient
        to: String,
        /// Pool shares
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Credit escrow balance (takes effect at the account's next settlement)
    Lock {
        /// Account
        account: String,
        /// Escrow amount
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Debit escrow balance
    Unlock {
        /// Account
        account: String,
        /// Escrow amount
        #[serde(with = "serde_u256")]
        amount: U256,
    },
    /// Settle one side for an account
    Settle {
        /// Pool
        pool: String,
        /// Side
        kind: DistributionKind,
        /// Account
        account: String,
    },
    /// Checkpoint one side
    Checkpoint {
        /// Pool
        pool: String,
        /// Side
        kind: DistributionKind,
    },
    /// Harvest pools for an account
    Harvest {
        /// Pools
        pools: Vec<String>,
        /// Account
        account: String,
    },
    /// Record (and optionally check) what an account has earned
    Observe {
        /// Pool
        pool: String,
        /// Account
        account: String,
        /// Side; both when absent
        #[serde(default)]
        kind: Option<DistributionKind>,
        /// Expected decimal amount
        #[serde(default)]
        expect: Option<String>,
    },
}

impl Action {
    /// Operation name as written in scenario files
    pub fn name(&self) -> &'static str {
        match self {
            Action::RegisterPool { .. } => "register_pool",
            Action::SetPoolEnabled { .. } => "set_pool_enabled",
            Action::Fund { .. } => "fund",
            Action::SetBoost { .. } => "set_boost",
            Action::Schedule { .. } => "schedule",
            Action::TopUp { .. } => "top_up",
            Action::Supply { .. } => "supply",
            Action::Redeem { .. } => "redeem",
            Action::Borrow { .. } => "borrow",
            Action::Repay { .. } => "repay",
            Action::Transfer { .. } => "transfer",
            Action::Lock { .. } => "lock",
            Action::Unlock { .. } => "unlock",
            Action::Settle { .. } => "settle",
            Action::Checkpoint { .. } => "checkpoint",
            Action::Harvest { .. } => "harvest",
            Action::Observe { .. } => "observe",
        }
    }
}

impl Scenario {
    /// Read a scenario from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse a scenario from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Steps must not go back in time
    pub fn validate(&self) -> Result<()> {
        for pair in self.steps.windows(2) {
            if pair[1].at < pair[0].at {
                return Err(Error::InvalidParameter {
                    name: "at".into(),
                    reason: format!("step at {} follows step at {}", pair[1].at, pair[0].at),
                });
            }
        }
        Ok(())
    }
}

/// Address for a hex string or a label
pub fn resolve_party(name: &str) -> Result<Address> {
    if name.starts_with("0x") {
        Address::from_hex(name)
    } else {
        Ok(Address::from_label(name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// What happened at one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step index
    pub index: usize,
    /// Step time
    pub at: u64,
    /// Operation name
    pub op: String,
    /// `None` on success, the error text otherwise
    pub error: Option<String>,
}

/// An `observe` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Step time
    pub at: u64,
    /// Pool as written
    pub pool: String,
    /// Account as written
    pub account: String,
    /// Earned amount
    #[serde(with = "serde_u256")]
    pub earned: U256,
}

/// A harvest payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    /// Step time
    pub at: u64,
    /// Account as written
    pub account: String,
    /// Paid amount
    #[serde(with = "serde_u256")]
    pub amount: U256,
}

/// Result of running a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Per-step outcomes, up to the first unexpected failure
    pub outcomes: Vec<StepOutcome>,
    /// `observe` results
    pub observations: Vec<Observation>,
    /// Harvest payments
    pub payouts: Vec<Payout>,
    /// Failed expectations and unexpected errors
    pub failures: Vec<String>,
    /// Final pool statistics
    pub pools: Vec<PoolStats>,
    /// Final budget
    pub budget: RewardBudget,
    /// Final ledger hash
    pub state_hash: String,
}

impl ScenarioReport {
    /// True if every expectation held and no step failed unexpectedly
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Controller type the runner drives
pub type SimController = Controller<Arc<InMemoryMarkets>, Arc<TokenBalances>, RewardTreasury>;

/// Executes scenarios against in-memory collaborators
pub struct ScenarioRunner {
    markets: Arc<InMemoryMarkets>,
    escrow: Arc<TokenBalances>,
    controller: SimController,
}

impl ScenarioRunner {
    /// Build the controller and collaborators a scenario describes
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let config = scenario.config.clone().unwrap_or_default();
        let markets = Arc::new(InMemoryMarkets::new());
        let escrow = Arc::new(TokenBalances::new());
        let reward = Arc::new(TokenBalances::new());

        let treasury = match &scenario.payout {
            PayoutSpec::Mint => RewardTreasury::minting(reward),
            PayoutSpec::Transfer { holder, reserves } => {
                let holder = resolve_party(holder)?;
                reward.mint(&holder, *reserves)?;
                RewardTreasury::transfer_from(reward, holder)
            }
        };

        let controller = Controller::new(config, markets.clone(), escrow.clone(), treasury)?;
        Ok(Self {
            markets,
            escrow,
            controller,
        })
    }

    /// Run a scenario from scratch
    pub fn run(scenario: &Scenario) -> Result<ScenarioReport> {
        let mut runner = Self::new(scenario)?;
        runner.execute(scenario)
    }

    /// Run every step and summarise
    pub fn execute(&mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        scenario.validate()?;
        let mut report = ScenarioReport {
            name: scenario.name.clone(),
            outcomes: Vec::new(),
            observations: Vec::new(),
            payouts: Vec::new(),
            failures: Vec::new(),
            pools: Vec::new(),
            budget: RewardBudget::default(),
            state_hash: String::new(),
        };

        for (index, step) in scenario.steps.iter().enumerate() {
            let result = self.apply(step, &mut report);
            let op = step.action.name();
            tracing::debug!("step {} ({}) at {}: {:?}", index, op, step.at, result);

            let error = result.as_ref().err().map(|e| e.to_string());
            report.outcomes.push(StepOutcome {
                index,
                at: step.at,
                op: op.to_string(),
                error,
            });

            match (result, step.expect_error) {
                (Ok(()), None) => {}
                (Err(e), Some(code)) if e.code() == code => {}
                (Ok(()), Some(code)) => {
                    report
                        .failures
                        .push(format!("step {} ({}): expected error {}, succeeded", index, op, code));
                }
                (Err(e), _) => {
                    report.failures.push(format!("step {} ({}): {}", index, op, e));
                    break;
                }
            }
        }

        let last = scenario.steps.last().map(|s| s.at).unwrap_or_default();
        for pool in self.controller.pools() {
            report.pools.push(self.controller.pool_stats(&pool, last)?);
        }
        report.budget = self.controller.budget().clone();
        report.state_hash = self.controller.ledger().state_hash().to_hex();
        Ok(report)
    }

    /// The driven controller
    pub fn controller(&self) -> &SimController {
        &self.controller
    }

    fn apply(&mut self, step: &ScenarioStep, report: &mut ScenarioReport) -> Result<()> {
        let now = step.at;
        match &step.action {
            Action::RegisterPool { pool } => self.controller.register_pool(resolve_party(pool)?, now),
            Action::SetPoolEnabled { pool, enabled } => {
                self.controller.set_pool_enabled(&resolve_party(pool)?, *enabled, now)
            }
            Action::Fund { amount } => self.controller.set_token_distribution(*amount, now),
            Action::SetBoost {
                ratio_pct,
                min_ve_amount,
            } => self.controller.set_boost(*ratio_pct, *min_ve_amount, now),
            Action::Schedule {
                pool,
                supply,
                borrow,
                start,
                duration,
            } => self.controller.distribute_rewards_2_pool(
                &resolve_party(pool)?,
                *supply,
                *borrow,
                *start,
                *duration,
                now,
            ),
            Action::TopUp { pool, supply, borrow } => {
                self.controller
                    .distribute_rewards_more(&resolve_party(pool)?, *supply, *borrow, now)
            }
            Action::Supply { pool, account, amount } => {
                let (pool, account) = (resolve_party(pool)?, resolve_party(account)?);
                self.markets.supply(&pool, &account, *amount)?;
                self.controller.on_supply_change(&pool, &account, now).map(drop)
            }
            Action::Redeem { pool, account, amount } => {
                let (pool, account) = (resolve_party(pool)?, resolve_party(account)?);
                self.markets.redeem(&pool, &account, *amount)?;
                self.controller.on_supply_change(&pool, &account, now).map(drop)
            }
            Action::Borrow { pool, account, amount } => {
                let (pool, account) = (resolve_party(pool)?, resolve_party(account)?);
                self.markets.borrow(&pool, &account, *amount)?;
                self.controller.on_borrow_change(&pool, &account, now).map(drop)
            }
            Action::Repay { pool, account, amount } => {
                let (pool, account) = (resolve_party(pool)?, resolve_party(account)?);
                self.markets.repay(&pool, &account, *amount)?;
                self.controller.on_borrow_change(&pool, &account, now).map(drop)
            }
            Action::Transfer { pool, from, to, amount } => {
                let (pool, from, to) = (resolve_party(pool)?, resolve_party(from)?, resolve_party(to)?);
                self.markets.transfer(&pool, &from, &to, *amount)?;
                self.controller.on_transfer(&pool, &from, &to, now)
            }
            Action::Lock { account, amount } => self.escrow.mint(&resolve_party(account)?, *amount),
            Action::Unlock { account, amount } => self.escrow.burn(&resolve_party(account)?, *amount),
            Action::Settle { pool, kind, account } => self
                .controller
                .settle(&resolve_party(pool)?, *kind, &resolve_party(account)?, now)
                .map(drop),
            Action::Checkpoint { pool, kind } => self.controller.checkpoint(&resolve_party(pool)?, *kind, now),
            Action::Harvest { pools, account } => {
                let ids = pools.iter().map(|p| resolve_party(p)).collect::<Result<Vec<_>>>()?;
                let amount = self.controller.harvest_all(&ids, &resolve_party(account)?, now)?;
                report.payouts.push(Payout {
                    at: now,
                    account: account.clone(),
                    amount,
                });
                Ok(())
            }
            Action::Observe {
                pool,
                account,
                kind,
                expect,
            } => {
                let (pool_id, account_id) = (resolve_party(pool)?, resolve_party(account)?);
                let earned = match kind {
                    Some(kind) => self.controller.earned(&pool_id, &account_id, *kind, now)?,
                    None => self.controller.earned_total(&pool_id, &account_id, now)?,
                };
                if let Some(expected) = expect {
                    let expected = parse_u256(expected)?;
                    if expected != earned {
                        report.failures.push(format!(
                            "observe {} on {} at {}: expected {}, got {}",
                            account, pool, now, expected, earned
                        ));
                    }
                }
                report.observations.push(Observation {
                    at: now,
                    pool: pool.clone(),
                    account: account.clone(),
                    earned,
                });
                Ok(())
            }
        }
    }
}
