use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::usage::{AccountDirectory, DEFAULT_REFERENCE_CPU_UTILIZATION};
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CHUNK_SIZE};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// One entry of the account directory
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AccountFileConfig {
    pub id: String,
    pub name: String,
}

/// Estimation configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EstimationFileConfig {
    pub reference_cpu_utilization: Option<f64>,
}

/// Knowledge-base configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TablesFileConfig {
    pub path: Option<String>,
}

/// Batch processing configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BatchFileConfig {
    pub chunk_size: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub accounts: Option<Vec<AccountFileConfig>>,
    pub estimation: Option<EstimationFileConfig>,
    pub tables: Option<TablesFileConfig>,
    pub batch: Option<BatchFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    ///
    /// Account lists are concatenated; a later entry for the same id wins
    /// when the directory is built.
    fn merge(&mut self, other: FileConfig) {
        // Accounts
        if let Some(accounts) = other.accounts {
            tracing::trace!(count = accounts.len(), "Merging accounts");
            self.accounts.get_or_insert_with(Vec::new).extend(accounts);
        }

        // Estimation
        if let Some(estimation) = other.estimation {
            let current = self
                .estimation
                .get_or_insert_with(EstimationFileConfig::default);
            if estimation.reference_cpu_utilization.is_some() {
                tracing::trace!(
                    reference_cpu_utilization = ?estimation.reference_cpu_utilization,
                    "Merging estimation.reference_cpu_utilization"
                );
                current.reference_cpu_utilization = estimation.reference_cpu_utilization;
            }
        }

        // Tables
        if let Some(tables) = other.tables {
            let current = self.tables.get_or_insert_with(TablesFileConfig::default);
            if tables.path.is_some() {
                tracing::trace!(path = ?tables.path, "Merging tables.path");
                current.path = tables.path;
            }
        }

        // Batch
        if let Some(batch) = other.batch {
            let current = self.batch.get_or_insert_with(BatchFileConfig::default);
            if batch.chunk_size.is_some() {
                tracing::trace!(chunk_size = ?batch.chunk_size, "Merging batch.chunk_size");
                current.chunk_size = batch.chunk_size;
            }
        }
    }
}

// =============================================================================
// Final Config Structs
// =============================================================================

/// Account id → display name directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountsConfig {
    names: HashMap<String, String>,
}

impl AccountsConfig {
    fn from_entries(entries: Vec<AccountFileConfig>) -> Self {
        Self {
            names: entries
                .into_iter()
                .map(|entry| (entry.id.trim().to_string(), entry.name))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl AccountDirectory for AccountsConfig {
    fn account_name(&self, account_id: &str) -> Option<String> {
        self.names.get(account_id).cloned()
    }
}

/// Usage estimation settings
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationConfig {
    pub reference_cpu_utilization: f64,
}

/// Knowledge-base source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablesConfig {
    /// Replacement tables file; `None` uses the embedded copy
    pub path: Option<PathBuf>,
}

/// Batch processing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub chunk_size: usize,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub accounts: AccountsConfig,
    pub estimation: EstimationConfig,
    pub tables: TablesConfig,
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.usage-normalizer/usage-normalizer.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_layers(file_config, cli)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_estimation = file_config.estimation.unwrap_or_default();
        let file_tables = file_config.tables.unwrap_or_default();
        let file_batch = file_config.batch.unwrap_or_default();

        let reference_cpu_utilization = cli
            .reference_cpu_utilization
            .or(file_estimation.reference_cpu_utilization)
            .unwrap_or(DEFAULT_REFERENCE_CPU_UTILIZATION);

        let tables_path = cli
            .tables
            .as_ref()
            .map(|p| expand_path(&p.to_string_lossy()))
            .or_else(|| file_tables.path.as_deref().map(expand_path));

        let chunk_size = cli
            .chunk_size
            .or(file_batch.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let config = Self {
            accounts: AccountsConfig::from_entries(file_config.accounts.unwrap_or_default()),
            estimation: EstimationConfig {
                reference_cpu_utilization,
            },
            tables: TablesConfig { path: tables_path },
            batch: BatchConfig { chunk_size },
        };

        config.validate()?;

        tracing::debug!(
            accounts = config.accounts.len(),
            reference_cpu_utilization = config.estimation.reference_cpu_utilization,
            tables = ?config.tables.path,
            chunk_size = config.batch.chunk_size,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        let reference = self.estimation.reference_cpu_utilization;
        if !(reference.is_finite() && reference > 0.0 && reference <= 1.0) {
            anyhow::bail!(
                "Configuration error: estimation.reference_cpu_utilization must be in (0, 1], got {}",
                reference
            );
        }

        if self.batch.chunk_size == 0 {
            anyhow::bail!("Configuration error: batch.chunk_size must be greater than 0");
        }

        if self.accounts.names.keys().any(|id| id.is_empty()) {
            anyhow::bail!("Configuration error: accounts[].id must not be empty");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.usage-normalizer/usage-normalizer.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
