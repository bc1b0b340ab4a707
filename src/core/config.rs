//! Engine configuration.
//!
//! Bounds the reward controller enforces on operator input, plus the boost a
//! fresh controller starts with. Loaded from JSON, with `COLLEDGER_*`
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::rewards::boost::BoostConfig;
use crate::utils::constants::*;
use crate::utils::math::parse_u256;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shortest accepted distribution window in seconds
    pub min_duration_secs: u64,

    /// Longest accepted distribution window in seconds
    pub max_duration_secs: u64,

    /// Largest boost ratio `set_boost` accepts, in percent
    pub max_boost_ratio_pct: u64,

    /// Boost a new controller starts with
    pub default_boost: BoostConfig,

    /// Tracing filter used by the binary when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: MIN_DISTRIBUTION_DURATION_SECS,
            max_duration_secs: MAX_DISTRIBUTION_DURATION_SECS,
            max_boost_ratio_pct: MAX_BOOST_RATIO_PCT,
            default_boost: BoostConfig::disabled(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create with custom duration bounds (for testing)
    pub fn with_duration_bounds(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.min_duration_secs = min_secs;
        self.max_duration_secs = max_secs;
        self
    }

    /// Create with a starting boost (for testing)
    pub fn with_boost(mut self, boost: BoostConfig) -> Self {
        self.default_boost = boost;
        self
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `COLLEDGER_*` environment overrides on top of `self`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(secs) = env_u64("MIN_DURATION_SECS")? {
            self.min_duration_secs = secs;
        }

        if let Some(secs) = env_u64("MAX_DURATION_SECS")? {
            self.max_duration_secs = secs;
        }

        if let Some(pct) = env_u64("MAX_BOOST_RATIO_PCT")? {
            self.max_boost_ratio_pct = pct;
        }

        if let Some(pct) = env_u64("BOOST_RATIO_PCT")? {
            self.default_boost.ratio_pct = pct;
        }

        if let Some(raw) = env_var("BOOST_MIN_VE")? {
            self.default_boost.min_ve_amount =
                parse_u256(&raw).map_err(|e| Error::Config(format!("{}BOOST_MIN_VE: {}", ENV_PREFIX, e)))?;
        }

        if let Some(filter) = env_var("LOG")? {
            self.log_filter = filter;
        }

        self.validate()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_duration_secs == 0 {
            return Err(Error::Config("min_duration_secs must be greater than 0".into()));
        }

        if self.min_duration_secs > self.max_duration_secs {
            return Err(Error::Config(format!(
                "min_duration_secs {} exceeds max_duration_secs {}",
                self.min_duration_secs, self.max_duration_secs
            )));
        }

        self.default_boost
            .validate(self.max_boost_ratio_pct)
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Check a window length against the configured bounds
    pub fn check_duration(&self, duration: u64) -> Result<()> {
        if duration < self.min_duration_secs || duration > self.max_duration_secs {
            return Err(Error::InvalidParameter {
                name: "duration".into(),
                reason: format!(
                    "{}s outside [{}s, {}s]",
                    duration, self.min_duration_secs, self.max_duration_secs
                ),
            });
        }
        Ok(())
    }
}

fn env_var(suffix: &str) -> Result<Option<String>> {
    let key = format!("{}{}", ENV_PREFIX, suffix);
    match std::env::var(&key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("{}: {}", key, e))),
    }
}

fn env_u64(suffix: &str) -> Result<Option<u64>> {
    env_var(suffix)?
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{}{}='{}': {}", ENV_PREFIX, suffix, raw, e)))
        })
        .transpose()
}
