//! Migration configuration: the reviewable filter policy (JSON file) and
//! the environment-derived target connection settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::schema::{SchemaOptions, TargetOptions};

/// The wildcard meaning "all collections found for this database".
pub const ALL_COLLECTIONS: &str = "*";

/// Per-database filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRule {
    /// Whether to migrate this database at all. `false` wins over any
    /// collection list.
    pub migrate: bool,
    /// Collections to include. The single-element list `["*"]` selects
    /// every collection found for the database at filter time.
    #[serde(default)]
    pub collections: Vec<String>,
}

impl DatabaseRule {
    /// Whether this rule selects all collections via the wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.collections.len() == 1 && self.collections[0] == ALL_COLLECTIONS
    }
}

/// Migration configuration file: the policy deciding which parts of the
/// extracted schema get materialized. Reviewed and versioned like any
/// other artifact; databases not listed here are excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Filter rules keyed by source database name.
    #[serde(default)]
    pub databases: HashMap<String, DatabaseRule>,
    /// Global options, copied into the resolved plan.
    #[serde(default)]
    pub options: SchemaOptions,
    /// Target naming options, copied into the resolved plan.
    #[serde(default)]
    pub target: TargetOptions,
}

impl MigrationConfig {
    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if
    /// it is not valid JSON or fails structural validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid migration config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation, independent of any extracted schema.
    ///
    /// Cross-checks against the extracted records (unknown databases,
    /// unknown collections) happen in the filter, where both sides are
    /// available.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on the first violation found.
    pub fn validate(&self) -> Result<()> {
        for (name, rule) in &self.databases {
            if name.is_empty() {
                return Err(Error::Config("empty database name in config".to_string()));
            }
            if rule.collections.contains(&ALL_COLLECTIONS.to_string()) && rule.collections.len() > 1
            {
                return Err(Error::Config(format!(
                    "database '{name}': wildcard \"*\" cannot be combined with explicit collection names"
                )));
            }
            for coll in &rule.collections {
                if coll.is_empty() {
                    return Err(Error::Config(format!(
                        "database '{name}': empty collection name in config"
                    )));
                }
            }
            if rule.migrate && rule.collections.is_empty() {
                return Err(Error::Config(format!(
                    "database '{name}': migrate is true but no collections are listed (use [\"*\"] for all)"
                )));
            }
        }
        Ok(())
    }
}

/// Connection settings for the target Data API, read from the
/// environment. Never hard-coded: a missing endpoint or key is a
/// startup-time error, not a mid-pipeline failure.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    /// Base URL of the target Data API endpoint.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Named data source on the target service.
    pub data_source: String,
    /// Per-operation timeout in seconds.
    pub timeout_secs: u64,
}

/// Default per-operation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

impl TargetSettings {
    /// Read settings from `DEST_DATA_API_URL`, `DEST_DATA_API_KEY`,
    /// `DEST_DATA_SOURCE` (optional) and `TIMEOUT_SECONDS` (optional).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the URL or key is absent, or when
    /// `TIMEOUT_SECONDS` is not a positive integer.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("DEST_DATA_API_URL").map_err(|_| {
            Error::Config(
                "DEST_DATA_API_URL is not set (target Data API endpoint)".to_string(),
            )
        })?;
        let api_key = std::env::var("DEST_DATA_API_KEY").map_err(|_| {
            Error::Config("DEST_DATA_API_KEY is not set (target API key)".to_string())
        })?;
        let data_source = std::env::var("DEST_DATA_SOURCE")
            .unwrap_or_else(|_| "mongodb-atlas".to_string());
        let timeout_secs = match std::env::var("TIMEOUT_SECONDS") {
            Ok(raw) => raw.parse::<u64>().ok().filter(|&t| t > 0).ok_or_else(|| {
                Error::Config(format!("TIMEOUT_SECONDS must be a positive integer, got '{raw}'"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let settings = Self {
            base_url,
            api_key,
            data_source,
            timeout_secs,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Basic endpoint sanity checks.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty key or a URL without an
    /// http(s) scheme.
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "invalid target URL scheme in '{}': expected http or https",
                self.base_url
            )));
        }
        if self.api_key.is_empty() {
            return Err(Error::Config("target API key is empty".to_string()));
        }
        Ok(())
    }

    /// The per-operation timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
