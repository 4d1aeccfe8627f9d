use crate::actor::{FaultPolicy, TeardownMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Bus-wide defaults applied to every actor created on the bus
///
/// ```toml
/// teardown = "halt"
/// fault_policy = "escalate"
/// thread_name_prefix = "pricing"
/// request_timeout_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BusConfig {
    /// What an actor does with queued work when it is dropped
    #[serde(default)]
    pub teardown: TeardownMode,

    /// What an actor does when one of its tasks panics
    #[serde(default)]
    pub fault_policy: FaultPolicy,

    /// Worker threads are named `<prefix>-<actor name>`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,

    /// Deadline armed by plain `send_request` calls (none by default)
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_thread_name_prefix() -> String {
    "hyphae".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            teardown: TeardownMode::default(),
            fault_policy: FaultPolicy::default(),
            thread_name_prefix: default_thread_name_prefix(),
            request_timeout_ms: None,
        }
    }
}

impl BusConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BusConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }

        if self.thread_name_prefix.contains('\0') {
            return Err(ConfigError::InvalidConfig(
                "thread_name_prefix must not contain NUL bytes".to_string(),
            ));
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn thread_name(&self, actor: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, actor)
    }
}
