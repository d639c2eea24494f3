use crate::error::{ConfigError, ConfigResult};
use crate::locking::cancellation::CancellationToken;
use crate::locking::cond::DEFAULT_LABEL;
use crate::locking::timeout::{WaitTimeoutResolution, WaitTimeoutResolver, WaitTimeoutValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Optional tuning for a [`Cond`](crate::locking::Cond) and the tokens used with it.
///
/// ```toml
/// [cond]
/// label = "job-queue"
///
/// [wait]
/// timeout = 30        # seconds, "250ms", or "infinite"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CondConfig {
    #[serde(default)]
    pub cond: CondSection,

    #[serde(default)]
    pub wait: WaitSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CondSection {
    #[serde(default = "default_label")]
    pub label: String,
}

impl Default for CondSection {
    fn default() -> Self {
        Self {
            label: default_label(),
        }
    }
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WaitSection {
    #[serde(default)]
    pub timeout: WaitTimeoutValue,
}

impl CondConfig {
    /// Loads configuration from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            log::debug!("Config file not found at {path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        log::debug!("Loaded config from {path:?}");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: CondConfig = toml::from_str(contents)
            .map_err(|e| ConfigError::ConfigFile(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ConfigFile(format!("Failed to serialize config: {e}")))?;

        fs::write(path, contents)?;
        log::debug!("Saved config to {path:?}");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cond.label.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "cond.label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the wait budget: caller override, then the environment, then this file.
    pub fn resolve_timeout(
        &self,
        caller_override: Option<&str>,
    ) -> ConfigResult<WaitTimeoutResolution> {
        let resolution = WaitTimeoutResolver::from_env(
            caller_override,
            self.wait.timeout,
            WaitTimeoutValue::default(),
        )
        .resolve()?;
        log::debug!(
            "Resolved wait timeout {} from {}",
            resolution.value,
            resolution.source
        );
        Ok(resolution)
    }

    /// Builds a token bounded by the resolved wait budget.
    pub fn wait_token(&self) -> ConfigResult<CancellationToken> {
        let resolution = self.resolve_timeout(None)?;
        Ok(CancellationToken::from_timeout_value(resolution.value))
    }
}
