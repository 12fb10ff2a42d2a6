//! Configuration management for the ledger engine.
//!
//! Provides the broker-quirks table: an embedded TOML default, optionally
//! merged with an override file, loaded once and cached behind a
//! [`std::sync::OnceLock`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::LedgerError;

/// Embedded default configuration.
static EMBEDDED_CONFIG: &str = include_str!("../data/quirks.toml");

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    #[serde(default, rename = "broker")]
    brokers: Vec<RawBrokerQuirk>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBrokerQuirk {
    id: String,
    #[serde(default)]
    transfer: bool,
    #[serde(default)]
    income_as_retofcap: bool,
}

/// Per-broker overrides the quirks dispatcher consults before routing a
/// transaction to its default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerQuirk {
    pub transfer: bool,
    pub income_as_retofcap: bool,
}

/// The resolved broker-quirks table.
#[derive(Debug, Clone, Default)]
pub struct Config {
    brokers: HashMap<String, BrokerQuirk>,
}

impl Config {
    /// Load the embedded default configuration.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_CONFIG).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to parse embedded quirks config");
            Self::default()
        })
    }

    fn from_toml(content: &str) -> Result<Self, LedgerError> {
        let raw: RawConfig = toml::from_str(content)?;
        let brokers = raw
            .brokers
            .into_iter()
            .map(|b| {
                (
                    b.id,
                    BrokerQuirk {
                        transfer: b.transfer,
                        income_as_retofcap: b.income_as_retofcap,
                    },
                )
            })
            .collect();
        Ok(Self { brokers })
    }

    /// Load configuration with override support.
    ///
    /// Checks for override files in the following order:
    /// 1. `./config.toml` (current directory)
    /// 2. `~/.config/lotledger/config.toml` (user config directory)
    ///
    /// Override files are merged with embedded defaults; override values win.
    pub fn load_with_overrides() -> Self {
        let mut config = Self::embedded();

        for path in Self::override_paths() {
            if path.exists()
                && let Ok(content) = std::fs::read_to_string(&path)
                && let Ok(override_config) = Self::from_toml(&content)
            {
                config.brokers.extend(override_config.brokers);
            }
        }

        config
    }

    fn override_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            paths.push(home.join(".config").join("lotledger").join("config.toml"));
        }
        paths
    }

    /// The quirk table for `broker`, if it has any overrides registered.
    pub fn quirk_for(&self, broker: &str) -> Option<BrokerQuirk> {
        self.brokers.get(broker).copied()
    }
}

/// The process-wide quirks table, loaded once on first use.
pub fn global() -> &'static Config {
    CONFIG.get_or_init(Config::load_with_overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_has_known_broker_quirk() {
        let config = Config::embedded();
        let quirk = config.quirk_for("4705").expect("broker 4705 in embedded table");
        assert!(quirk.transfer);
        assert!(quirk.income_as_retofcap);
    }

    #[test]
    fn unknown_broker_has_no_quirk() {
        let config = Config::embedded();
        assert!(config.quirk_for("nonexistent").is_none());
    }
}
