//! The `scriptgate` configuration file.
//!
//! ```toml
//! [gate]
//! enabled = true
//! signing_key = "..."
//! expected_user_id = "+14155550123"
//!
//! [engine]
//! timeout_secs = 120
//!
//! [credentials]
//! use_secret_store = false
//! ```
//!
//! Every table and key is optional. Gate settings can be overridden from the
//! environment (`SCRIPTGATE_GATE_ENABLED`, `SCRIPTGATE_SIGNING_KEY`, ...).

use std::path::Path;

use serde::{Deserialize, Serialize};

use scriptgate_contracts::error::{ScriptGateError, ScriptGateResult};
use scriptgate_core::EngineConfig;
use scriptgate_credentials::ResolverConfig;
use scriptgate_security::GateConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gate: GateConfig,
    pub engine: EngineConfig,
    pub credentials: ResolverConfig,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> ScriptGateResult<Self> {
        toml::from_str(s).map_err(|e| ScriptGateError::Config {
            reason: format!("failed to parse scriptgate TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> ScriptGateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ScriptGateError::Config {
            reason: format!("failed to read config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults, or the file at `path`, with gate overrides from `lookup` applied.
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ScriptGateResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.gate = settings.gate.with_overrides(lookup)?;
        Ok(settings)
    }
}
