//! Command-line support for the `colledger` binary.
//!
//! Provides vector file loading, output formatting and the scenario runner.

pub mod scenario;

pub use scenario::*;

use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ledger::vector::CollateralVector;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(Error::InvalidParameter {
                name: "format".into(),
                reason: format!("unknown format: {}", s),
            }),
        }
    }
}

/// Pretty JSON for any serializable value
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Serialization(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VECTOR FILES
// ═══════════════════════════════════════════════════════════════════════════════

/// Read and validate a collateral vector from a JSON file
pub fn load_vector(path: &Path) -> Result<CollateralVector> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let vector: CollateralVector = serde_json::from_str(&content)
        .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;
    vector.validate()?;
    Ok(vector)
}

/// One `token amount` line per entry
pub fn render_vector(vector: &CollateralVector) -> String {
    vector
        .iter()
        .map(|(token, amount)| format!("{} {}", token, amount))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::TokenId;
    use crate::utils::math::U256;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_load_vector_validates() {
        let dir = tempfile::tempdir().unwrap();
        let token = TokenId::from_low_u64(1);

        let good = dir.path().join("good.json");
        std::fs::write(&good, format!(r#"{{"tokens":["{}"],"amounts":["7"]}}"#, token)).unwrap();
        let vector = load_vector(&good).unwrap();
        assert_eq!(vector.amount_for(&token), Some(U256::from(7u64)));
        assert_eq!(render_vector(&vector), format!("{} 7", token));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, format!(r#"{{"tokens":["{}"],"amounts":[]}}"#, token)).unwrap();
        assert!(matches!(
            load_vector(&bad),
            Err(Error::MismatchedLengths { .. })
        ));
    }
}
