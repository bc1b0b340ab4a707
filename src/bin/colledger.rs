//! colledger CLI
//!
//! Merge collateral vectors and run reward accrual scenarios from the shell.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::{style, Term};

use colledger::cli::{load_vector, render_vector, to_pretty_json, OutputFormat, Scenario, ScenarioReport, ScenarioRunner};
use colledger::core::config::EngineConfig;
use colledger::ledger::merge::{densify, MergeOp};
use colledger::ledger::whitelist::Whitelist;
use colledger::storage::{FileStore, StateManager};
use colledger::utils::crypto::TokenId;

/// colledger - collateral ledgers and reward accrual
#[derive(Parser)]
#[command(name = "colledger")]
#[command(version = colledger::VERSION)]
#[command(about = "Collateral vector merging and time-weighted reward simulation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long, env = "COLLEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two collateral vector files
    Merge {
        /// Operation: sum, sub, left-sum, left-sub
        #[arg(short, long, default_value = "sum")]
        op: MergeOp,

        /// Left operand
        left: PathBuf,

        /// Right operand
        right: PathBuf,
    },

    /// Expand a sparse vector into whitelist order
    Densify {
        /// Whitelist file: JSON array of token addresses
        #[arg(short, long)]
        whitelist: PathBuf,

        /// Vector file
        vector: PathBuf,
    },

    /// Run a reward scenario
    Simulate {
        /// Scenario file
        scenario: PathBuf,

        /// Persist the final ledger and events into this directory
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Destination
        #[arg(default_value = "colledger.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    let term = Term::stdout();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_command(&cli, &config, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn run_command(cli: &Cli, config: &EngineConfig, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Merge { op, left, right } => cmd_merge(cli.format, *op, left, right, term),
        Commands::Densify { whitelist, vector } => cmd_densify(cli.format, whitelist, vector, term),
        Commands::Simulate { scenario, state_dir } => {
            cmd_simulate(cli.format, config, scenario, state_dir.as_deref(), term)
        }
        Commands::Config(ConfigCommands::Init { path, force }) => cmd_config_init(path, *force, term),
        Commands::Config(ConfigCommands::Show) => {
            term.write_line(&to_pretty_json(config)?)?;
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_merge(format: OutputFormat, op: MergeOp, left: &Path, right: &Path, term: &Term) -> anyhow::Result<()> {
    let a = load_vector(left)?;
    let b = load_vector(right)?;
    let merged = op.apply(&a, &b)?;

    match format {
        OutputFormat::Json => term.write_line(&to_pretty_json(&merged)?)?,
        OutputFormat::Text => term.write_line(&render_vector(&merged))?,
    }
    Ok(())
}

fn cmd_densify(format: OutputFormat, whitelist: &Path, vector: &Path, term: &Term) -> anyhow::Result<()> {
    let tokens: Vec<TokenId> = serde_json::from_str(&std::fs::read_to_string(whitelist)?)?;
    let whitelist = Whitelist::from_tokens(tokens)?;
    let dense = densify(&whitelist, &load_vector(vector)?)?;

    match format {
        OutputFormat::Json => term.write_line(&to_pretty_json(&dense)?)?,
        OutputFormat::Text => term.write_line(&render_vector(&dense))?,
    }
    Ok(())
}

fn cmd_simulate(
    format: OutputFormat,
    config: &EngineConfig,
    path: &Path,
    state_dir: Option<&Path>,
    term: &Term,
) -> anyhow::Result<()> {
    let mut scenario = Scenario::load(path)?;
    if scenario.config.is_none() {
        scenario.config = Some(config.clone());
    }

    let mut runner = ScenarioRunner::new(&scenario)?;
    let report = runner.execute(&scenario)?;

    if let Some(dir) = state_dir {
        let manager = StateManager::new(FileStore::new(dir)?);
        let last = scenario.steps.last().map(|s| s.at).unwrap_or_default();
        manager.save_ledger(runner.controller().ledger(), last)?;
        manager.append_events(runner.controller().events().events())?;
        manager.flush()?;
        tracing::info!("State written to {}", dir.display());
    }

    match format {
        OutputFormat::Json => term.write_line(&to_pretty_json(&report)?)?,
        OutputFormat::Text => print_report(&report, term)?,
    }

    if !report.passed() {
        anyhow::bail!("{} scenario check(s) failed", report.failures.len());
    }
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool, term: &Term) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists. Use --force to overwrite.", path.display());
    }
    EngineConfig::default().save(path)?;
    term.write_line(&format!("{} Wrote {}", style("✓").green(), path.display()))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

fn print_report(report: &ScenarioReport, term: &Term) -> anyhow::Result<()> {
    let title = if report.name.is_empty() { "scenario" } else { &report.name };
    term.write_line(&format!("{} {}", style("→").cyan(), style(title).bold()))?;

    for outcome in &report.outcomes {
        let mark = match &outcome.error {
            None => style("ok".to_string()).green(),
            Some(e) => style(e.clone()).yellow(),
        };
        term.write_line(&format!("  [{:>3}] t={:<12} {:<18} {}", outcome.index, outcome.at, outcome.op, mark))?;
    }

    for observation in &report.observations {
        term.write_line(&format!(
            "  earned  {} on {} at {}: {}",
            observation.account, observation.pool, observation.at, observation.earned
        ))?;
    }
    for payout in &report.payouts {
        term.write_line(&format!("  paid    {} at {}: {}", payout.account, payout.at, payout.amount))?;
    }
    for pool in &report.pools {
        term.write_line(&format!(
            "  pool    {} supply rate {} / borrow rate {}, distributed {} + {}",
            pool.pool.short(),
            pool.supply.reward_rate,
            pool.borrow.reward_rate,
            pool.supply.distributed,
            pool.borrow.distributed
        ))?;
    }
    term.write_line(&format!(
        "  budget  unallocated {}, outstanding {}",
        report.budget.unallocated, report.budget.outstanding
    ))?;
    term.write_line(&format!("  state   {}", report.state_hash))?;

    for failure in &report.failures {
        term.write_line(&format!("{} {}", style("✗").red(), failure))?;
    }
    if report.passed() {
        term.write_line(&format!("{} all checks passed", style("✓").green()))?;
    }
    Ok(())
}
