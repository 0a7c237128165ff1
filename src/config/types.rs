use serde::{Deserialize, Serialize};

use crate::device::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_SCAN_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Read the battery data on a timer. If false, subscribe to notifications instead.
    pub use_polling: bool,
    pub poll_interval_ms: u64,
    /// How long to look for a battery monitor after pressing connect.
    pub scan_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_polling: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Values given on the command line, these take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub use_polling: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub scan_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(use_polling) = self.use_polling {
            config.use_polling = use_polling;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.poll_interval_ms = poll_interval_ms;
        }
        if let Some(scan_timeout_ms) = self.scan_timeout_ms {
            config.scan_timeout_ms = scan_timeout_ms;
        }
        config
    }
}
