use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum number of messages in one import request
pub const DEFAULT_BATCH_MAX_ITEMS: usize = 10;

/// Default maximum cumulative body size of one import request (25 MB)
pub const DEFAULT_BATCH_MAX_SIZE: usize = 25 * 1000 * 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferSettings {
    /// Remote address the imported messages belong to
    #[serde(default)]
    pub address_id: String,
    /// Capacity of the channel between source and target
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Mailbox added to every transferred message
    pub global_mailbox: Option<GlobalMailboxConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalMailboxConfig {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_max_items() -> usize {
    DEFAULT_BATCH_MAX_ITEMS
}

fn default_max_size() -> usize {
    DEFAULT_BATCH_MAX_SIZE
}

fn default_channel_capacity() -> usize {
    64
}

fn default_color() -> String {
    "#7272a7".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_BATCH_MAX_ITEMS,
            max_size: DEFAULT_BATCH_MAX_SIZE,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            address_id: String::new(),
            channel_capacity: default_channel_capacity(),
            global_mailbox: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            transfer: TransferSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TransferConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TransferError::Config(e.to_string()))?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every flush a no-op
    pub fn validate(&self) -> Result<()> {
        if self.batch.max_items == 0 {
            return Err(TransferError::Config("batch.max_items must be at least 1".to_string()));
        }
        if self.batch.max_size == 0 {
            return Err(TransferError::Config("batch.max_size must be at least 1".to_string()));
        }
        if self.transfer.channel_capacity == 0 {
            return Err(TransferError::Config(
                "transfer.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
