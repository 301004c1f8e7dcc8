//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scriptgate_contracts::gate::SECURITY_ASSERTION_KEY;

/// Default wall-clock limit for one script run.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings for `Engine`. Usually the `[engine]` table of the scriptgate TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard wall-clock limit for a script body.
    pub timeout_secs: u64,
    /// Input keys consumed by the engine and removed before schema validation
    /// and before the script sees its inputs.
    pub framework_keys: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            framework_keys: vec![SECURITY_ASSERTION_KEY.to_string()],
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
