//! Script manifest types.
//!
//! A manifest is the static descriptor that ships next to every script body.
//! It is loaded fresh from `manifest.json` on each execution and never
//! mutated by the engine.

use serde::{Deserialize, Serialize};

/// Name of the manifest file inside a script directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Lock name acquired by every script that declares browser access.
pub const BROWSER_PROFILE_LOCK: &str = "browser_profile:default";

/// Static descriptor for a single script.
///
/// All paths are relative to the script directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Stable script identifier (e.g. "united-award-search").
    pub id: String,
    /// Script version string. Opaque to the engine.
    pub version: String,
    /// Relative path to the entrypoint.
    pub entrypoint: String,
    /// Relative path to the JSON Schema describing accepted inputs.
    pub inputs_schema: String,
    /// Relative path to the JSON Schema describing the result object.
    pub outputs_schema: String,
    /// Sandbox permissions the script declares.
    #[serde(default)]
    pub permissions: Permissions,
    /// Ordered descriptions of steps a human must perform during the run.
    ///
    /// Used by the security gate to infer risk ("Enter 2FA code", "Solve CAPTCHA").
    #[serde(default)]
    pub requires_human_steps: Vec<String>,
    /// Explicit risk declaration, if the author provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityProfile>,
    /// Free-form description for operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Manifest {
    /// Named locks a run of this script must hold while it executes.
    pub fn required_locks(&self) -> Vec<String> {
        if self.permissions.browser {
            vec![BROWSER_PROFILE_LOCK.to_string()]
        } else {
            Vec::new()
        }
    }

    /// Every path the manifest declares, paired with a label for error messages.
    pub fn declared_paths(&self) -> [(&'static str, &str); 3] {
        [
            ("entrypoint", self.entrypoint.as_str()),
            ("inputs_schema", self.inputs_schema.as_str()),
            ("outputs_schema", self.outputs_schema.as_str()),
        ]
    }
}

/// Sandbox permissions declared by a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Whether the script drives the shared browser profile.
    #[serde(default)]
    pub browser: bool,
    /// Domains the script is allowed to contact.
    #[serde(default)]
    pub network_domains: Vec<String>,
}

/// Optional risk block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfile {
    /// Free-form risk level; "high" and "critical" are treated as risky.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    /// The run must be backed by a recent out-of-band verification.
    #[serde(default)]
    pub requires_recent_verification: bool,
    /// The script changes state on the remote side (bookings, transfers).
    #[serde(default)]
    pub state_changing: bool,
}

impl SecurityProfile {
    /// True when the declared risk level is "high" or "critical" (any case).
    pub fn has_elevated_risk_level(&self) -> bool {
        self.risk_level
            .as_deref()
            .map(|level| {
                let level = level.trim().to_ascii_lowercase();
                level == "high" || level == "critical"
            })
            .unwrap_or(false)
    }
}
