use serde::{Deserialize, Serialize};

use crate::store::keys;

/// Configuration for the "refresh data" reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay between signalling the outcome and reloading (default: 1500ms)
    pub reload_delay_ms: u64,

    /// Preference keys that survive a refresh
    pub preserve: Vec<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            reload_delay_ms: 1500,
            preserve: vec![
                keys::THEME.to_string(),
                keys::FLAVOR.to_string(),
                keys::LAST_READ.to_string(),
            ],
        }
    }
}
