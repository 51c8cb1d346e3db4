use config::{Config, ConfigError};
use serde::Deserialize;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

pub const CONFIG_KEY_STORE: &str = "store";
pub const CONFIG_KEY_MAX_FUTURE_SKEW: &str = "max-future-skew-secs";

/// Default allowance for block timestamps ahead of local time: one hour.
pub const DEFAULT_MAX_FUTURE_SKEW_SECS: u64 = 60 * 60;

/// Which block store backs the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Fjall,
    Memory,
}

impl StoreKind {
    /// Reads the `store` key, defaulting to fjall when it is absent.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match config.get::<StoreKind>(CONFIG_KEY_STORE) {
            Err(ConfigError::NotFound(_)) => Ok(StoreKind::Fjall),
            other => other,
        }
    }
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Fjall => write!(f, "fjall"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

/// How far ahead of local time a block timestamp may be before it is refused
pub fn max_future_skew(config: &Config) -> Duration {
    let secs = config
        .get_int(CONFIG_KEY_MAX_FUTURE_SKEW)
        .ok()
        .and_then(|secs| u64::try_from(secs).ok())
        .unwrap_or(DEFAULT_MAX_FUTURE_SKEW_SECS);
    Duration::from_secs(secs)
}
