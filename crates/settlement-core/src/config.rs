//! Settlement configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//!
//! | Variable                      | Field                      |
//! |-------------------------------|----------------------------|
//! | `SETTLEMENT_CURRENCY`         | `currency`                 |
//! | `SETTLEMENT_DEFAULT_COVERAGE` | `default_coverage_percent` |
//! | `SETTLEMENT_INVOICE_PREFIX`   | `invoice_prefix`           |
//! | `SETTLEMENT_LOG`              | `log_filter`               |

use crate::{lenient, money, SettlementError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "settlement.toml";

pub const ENV_CURRENCY: &str = "SETTLEMENT_CURRENCY";
pub const ENV_DEFAULT_COVERAGE: &str = "SETTLEMENT_DEFAULT_COVERAGE";
pub const ENV_INVOICE_PREFIX: &str = "SETTLEMENT_INVOICE_PREFIX";
pub const ENV_LOG: &str = "SETTLEMENT_LOG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// ISO 4217 code printed on invoices and sheets
    pub currency: String,
    /// Coverage applied when a request does not carry one
    #[serde(deserialize_with = "lenient::percent")]
    pub default_coverage_percent: Decimal,
    /// Invoice numbers start with this prefix
    pub invoice_prefix: String,
    /// `tracing` filter directive used by the CLI
    pub log_filter: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "DZD".to_string(),
            default_coverage_percent: Decimal::from(80),
            invoice_prefix: "FAC".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl SettlementConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, SettlementError> {
        let mut config: SettlementConfig =
            toml::from_str(content).map_err(|e| SettlementError::Config(e.to_string()))?;
        config.default_coverage_percent = money::clamp_percent(config.default_coverage_percent);
        Ok(config)
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// used when present, otherwise defaults. Environment overrides apply
    /// in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, SettlementError> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    fn from_file(path: &Path) -> Result<Self, SettlementError> {
        info!("Loading settlement config from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| {
            SettlementError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(currency) = lookup(ENV_CURRENCY) {
            self.currency = currency;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_COVERAGE) {
            match Decimal::from_str(raw.trim()) {
                Ok(percent) => self.default_coverage_percent = money::clamp_percent(percent),
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_DEFAULT_COVERAGE, raw),
            }
        }
        if let Some(prefix) = lookup(ENV_INVOICE_PREFIX) {
            self.invoice_prefix = prefix;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        self
    }
}
