//! Kernel configuration, loadable from TOML.
//!
//! ```toml
//! [kernel]
//! strict = true
//! max_slot_iterations = 5000
//! shuffle_seed = 7
//!
//! [run]
//! limit = "100ns"
//! ```

use std::path::Path;

use kairos_common::duration::parse_fs;
use serde::{Deserialize, Serialize};

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not parse.
    #[error("cannot parse config: {0}")]
    Parse(String),

    /// A field holds a value the kernel cannot use.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field path.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

fn default_max_slot_iterations() -> u32 {
    10_000
}

/// The `[kernel]` table: scheduler behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSection {
    /// Enable strict-mode checks (semaphore over-release, same-slot
    /// nonblocking overwrite).
    #[serde(default)]
    pub strict: bool,
    /// Bound on work batches within one instant, against zero-delay loops.
    #[serde(default = "default_max_slot_iterations")]
    pub max_slot_iterations: u32,
    /// Seed for shuffling same-region batches, to surface accidental
    /// dependence on the (unspecified) intra-region order. Off by default.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl Default for KernelSection {
    fn default() -> Self {
        Self {
            strict: false,
            max_slot_iterations: default_max_slot_iterations(),
            shuffle_seed: None,
        }
    }
}

/// The `[run]` table: run-length control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSection {
    /// Wall-clock limit for the run, as a duration string like `"100ns"`.
    /// Absent means run to quiescence.
    #[serde(default)]
    pub limit: Option<String>,
}

/// Full kernel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Scheduler behavior.
    #[serde(default)]
    pub kernel: KernelSection,
    /// Run-length control.
    #[serde(default)]
    pub run: RunSection,
}

impl KernelConfig {
    /// The configured run limit in femtoseconds, if any.
    pub fn time_limit_fs(&self) -> Result<Option<u64>, ConfigError> {
        match &self.run.limit {
            None => Ok(None),
            Some(text) => parse_fs(text)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    field: "run.limit",
                    reason: e.to_string(),
                }),
        }
    }
}

/// Reads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<KernelConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<KernelConfig, ConfigError> {
    let config: KernelConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &KernelConfig) -> Result<(), ConfigError> {
    if config.kernel.max_slot_iterations == 0 {
        return Err(ConfigError::InvalidValue {
            field: "kernel.max_slot_iterations",
            reason: "must be at least 1".into(),
        });
    }
    config.time_limit_fs()?;
    Ok(())
}
