//! Security gate configuration.
//!
//! `GateConfig` is deserialized from TOML (standalone, or as the `[gate]`
//! table of the scriptgate config file). The gate never reads the process
//! environment itself; `with_overrides` applies values from any lookup the
//! caller passes in.
//!
//! Example:
//! ```toml
//! enabled = true
//! signing_key = "change-me"
//! max_age_secs = 900
//! expected_user_id = "+14155550123"
//! contact_hint = "reply YES to the verification SMS"
//! ```

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use scriptgate_contracts::error::{ScriptGateError, ScriptGateResult};

/// Default ceiling on assertion age, measured from `verified_at`.
pub const DEFAULT_MAX_AGE_SECS: i64 = 900;

/// Default lifetime of newly issued assertions.
pub const DEFAULT_ASSERTION_TTL_SECS: i64 = 600;

/// Verification method required unless configured otherwise.
pub const DEFAULT_REQUIRED_METHOD: &str = "totp";

/// Environment keys understood by [`GateConfig::with_overrides`].
pub mod env_keys {
    pub const ENABLED: &str = "SCRIPTGATE_GATE_ENABLED";
    pub const REQUIRE_ALL: &str = "SCRIPTGATE_REQUIRE_ALL";
    pub const SIGNING_KEY: &str = "SCRIPTGATE_SIGNING_KEY";
    pub const MAX_AGE_SECS: &str = "SCRIPTGATE_MAX_AGE_SECS";
    pub const EXPECTED_USER: &str = "SCRIPTGATE_EXPECTED_USER";
    pub const SESSION_BINDING: &str = "SCRIPTGATE_SESSION_BINDING";
}

/// Every knob of the security gate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// When false every run is allowed (risk is still computed and reported).
    pub enabled: bool,
    /// Treat every run as risky.
    pub require_for_all: bool,
    /// HMAC key for assertions. Without it, risky runs are always blocked.
    pub signing_key: Option<String>,
    /// Maximum `now - verified_at`, independent of `expires_at`.
    pub max_age_secs: i64,
    /// How far `verified_at` may lie in the future.
    pub clock_skew_secs: i64,
    pub expected_user_id: Option<String>,
    /// Compared case-insensitively. `None` accepts any method.
    pub required_method: Option<String>,
    pub expected_session_binding: Option<String>,
    /// Appended to "missing security_assertion" so the caller knows where to verify.
    pub contact_hint: Option<String>,
    /// Lifetime of assertions issued with this config.
    pub assertion_ttl_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            require_for_all: false,
            signing_key: None,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            clock_skew_secs: 0,
            expected_user_id: None,
            required_method: Some(DEFAULT_REQUIRED_METHOD.to_string()),
            expected_session_binding: None,
            contact_hint: None,
            assertion_ttl_secs: DEFAULT_ASSERTION_TTL_SECS,
        }
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("enabled", &self.enabled)
            .field("require_for_all", &self.require_for_all)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("max_age_secs", &self.max_age_secs)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("expected_user_id", &self.expected_user_id)
            .field("required_method", &self.required_method)
            .field("expected_session_binding", &self.expected_session_binding)
            .field("contact_hint", &self.contact_hint)
            .field("assertion_ttl_secs", &self.assertion_ttl_secs)
            .finish()
    }
}

impl GateConfig {
    /// Parse `s` as a TOML gate configuration.
    ///
    /// Returns `ScriptGateError::Config` if the TOML is malformed or does not
    /// match `GateConfig`.
    pub fn from_toml_str(s: &str) -> ScriptGateResult<Self> {
        toml::from_str(s).map_err(|e| ScriptGateError::Config {
            reason: format!("failed to parse gate TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML gate configuration.
    pub fn from_file(path: &Path) -> ScriptGateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ScriptGateError::Config {
            reason: format!("failed to read gate config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply overrides from `lookup` (usually the process environment).
    ///
    /// Keys are listed in [`env_keys`]. Unset keys leave the value unchanged.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ScriptGateResult<Self> {
        if let Some(raw) = lookup(env_keys::ENABLED) {
            self.enabled = parse_flag(env_keys::ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(env_keys::REQUIRE_ALL) {
            self.require_for_all = parse_flag(env_keys::REQUIRE_ALL, &raw)?;
        }
        if let Some(key) = lookup(env_keys::SIGNING_KEY) {
            self.signing_key = Some(key);
        }
        if let Some(raw) = lookup(env_keys::MAX_AGE_SECS) {
            self.max_age_secs = raw.trim().parse().map_err(|e| ScriptGateError::Config {
                reason: format!("{} must be an integer: {e}", env_keys::MAX_AGE_SECS),
            })?;
        }
        if let Some(user) = lookup(env_keys::EXPECTED_USER) {
            self.expected_user_id = Some(user);
        }
        if let Some(binding) = lookup(env_keys::SESSION_BINDING) {
            self.expected_session_binding = Some(binding);
        }
        Ok(self)
    }

    /// The configured signing key, if it is non-empty.
    pub fn signing_key(&self) -> Option<&str> {
        self.signing_key.as_deref().filter(|k| !k.is_empty())
    }
}

fn parse_flag(key: &str, raw: &str) -> ScriptGateResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ScriptGateError::Config {
            reason: format!("{key} must be a boolean, got '{other}'"),
        }),
    }
}
