// SPDX-License-Identifier: Apache-2.0

//! Gateway configuration
//!
//! Loaded from an optional JSON file, then overridden from the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vdbgate_core::{dialect, GatewayError, GatewayResult};

pub const ENV_PROBE_TIMEOUT_MS: &str = "VDBGATE_PROBE_TIMEOUT_MS";
pub const ENV_DEPLOY_TIMEOUT_MS: &str = "VDBGATE_DEPLOY_TIMEOUT_MS";
pub const ENV_TRANSLATORS: &str = "VDBGATE_TRANSLATORS";

fn default_probe_timeout_ms() -> u64 {
    15_000
}

fn default_deploy_timeout_ms() -> u64 {
    60_000
}

fn default_translators() -> Vec<String> {
    dialect::known_translators()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Configuration handed to the embedded engine on start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Translators registered with the engine on start.
    /// Models bound to a translator missing here fail to deploy.
    #[serde(default = "default_translators")]
    pub translators: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            translators: default_translators(),
        }
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Upper bound for opening a connection to read driver metadata (milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Upper bound for one undeploy+deploy cycle (milliseconds)
    #[serde(default = "default_deploy_timeout_ms")]
    pub deploy_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
            deploy_timeout_ms: default_deploy_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            debug!("No gateway config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::config(format!("Failed to read config: {e}")))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        info!("Loaded gateway configuration from {:?}", path);
        Ok(config)
    }

    /// Applies `VDBGATE_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> GatewayResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> GatewayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PROBE_TIMEOUT_MS) {
            self.probe_timeout_ms = parse_millis(ENV_PROBE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_DEPLOY_TIMEOUT_MS) {
            self.deploy_timeout_ms = parse_millis(ENV_DEPLOY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_TRANSLATORS) {
            self.engine.translators = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        self.validate()
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.probe_timeout_ms == 0 {
            return Err(GatewayError::config("probe_timeout_ms must be greater than 0"));
        }
        if self.deploy_timeout_ms == 0 {
            return Err(GatewayError::config("deploy_timeout_ms must be greater than 0"));
        }
        if self.engine.translators.iter().any(|t| t.trim().is_empty()) {
            return Err(GatewayError::config("translator ids must not be empty"));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, value: &str) -> GatewayResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| GatewayError::config(format!("{key}: invalid value '{value}': {e}")))
}
