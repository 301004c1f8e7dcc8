//! The security gate.
//!
//! `SecurityGate` holds a `GateConfig` and implements the `GateEvaluator`
//! trait from scriptgate-core.
//!
//! Evaluation algorithm:
//!
//! 1. Classify the run. It is risky when any risk factor applies: the global
//!    `require_for_all` flag, a non-empty `credential_refs` object, a human
//!    step mentioning 2FA/MFA/OTP/captcha/login, or the manifest's own
//!    security profile.
//! 2. A disabled gate allows everything. An enabled gate allows runs that are
//!    not risky.
//! 3. A risky run needs a `security_assertion` in its inputs that passes
//!    [`verify_assertion`]. Anything else blocks with the rejection's text.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use scriptgate_contracts::{
    error::ScriptGateResult,
    gate::{GateDecision, CREDENTIAL_REFS_KEY, SECURITY_ASSERTION_KEY},
    manifest::Manifest,
};
use scriptgate_core::traits::GateEvaluator;

use crate::{
    assertion::{verify_assertion, GateRejection},
    config::GateConfig,
};

/// Substrings of a human step that mark it as an interactive login challenge.
const CHALLENGE_MARKERS: [&str; 5] = ["2fa", "mfa", "otp", "captcha", "login"];

/// A `GateEvaluator` driven by a [`GateConfig`].
///
/// ```rust,ignore
/// use scriptgate_security::{GateConfig, SecurityGate};
///
/// let gate = SecurityGate::from_file(Path::new("gate.toml"))?;
/// let decision = gate.evaluate(&manifest, &inputs, now);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecurityGate {
    config: GateConfig,
}

impl SecurityGate {
    pub fn new(config: GateConfig) -> Self {
        if config.enabled && config.signing_key().is_none() {
            warn!("security gate enabled without a signing key; every risky run will be blocked");
        }
        Self { config }
    }

    /// Parse `s` as TOML gate configuration and build a gate from it.
    pub fn from_toml_str(s: &str) -> ScriptGateResult<Self> {
        GateConfig::from_toml_str(s).map(Self::new)
    }

    pub fn from_file(path: &Path) -> ScriptGateResult<Self> {
        GateConfig::from_file(path).map(Self::new)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Every reason this run counts as risky. Empty means not risky.
    pub fn risk_factors(&self, manifest: &Manifest, inputs: &Value) -> Vec<String> {
        let mut factors = Vec::new();

        if self.config.require_for_all {
            factors.push("gate requires verification for all runs".to_string());
        }

        let has_refs = inputs
            .get(CREDENTIAL_REFS_KEY)
            .and_then(Value::as_object)
            .is_some_and(|refs| !refs.is_empty());
        if has_refs {
            factors.push("inputs carry credential_refs".to_string());
        }

        for step in &manifest.requires_human_steps {
            let lowered = step.to_lowercase();
            if CHALLENGE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                factors.push(format!("human step '{step}' is a login challenge"));
            }
        }

        if let Some(profile) = &manifest.security {
            if profile.requires_recent_verification {
                factors.push("manifest requires recent verification".to_string());
            }
            if profile.state_changing {
                factors.push("manifest declares a state-changing script".to_string());
            }
            if profile.has_elevated_risk_level() {
                factors.push("manifest declares an elevated risk level".to_string());
            }
        }

        factors
    }

    pub fn is_risky(&self, manifest: &Manifest, inputs: &Value) -> bool {
        !self.risk_factors(manifest, inputs).is_empty()
    }
}

impl GateEvaluator for SecurityGate {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn evaluate(&self, manifest: &Manifest, inputs: &Value, now: i64) -> GateDecision {
        let factors = self.risk_factors(manifest, inputs);
        let risky = !factors.is_empty();
        debug!(script_id = %manifest.id, risky, ?factors, "classified run");

        if !self.config.enabled {
            return GateDecision::allow(false, risky, false);
        }
        if !risky {
            return GateDecision::allow(true, false, false);
        }

        let rejection = match inputs.get(SECURITY_ASSERTION_KEY) {
            None | Some(Value::Null) => GateRejection::MissingAssertion {
                hint: self.config.contact_hint.clone(),
            },
            Some(value) => match verify_assertion(value, &self.config, now) {
                Ok(assertion) => {
                    info!(
                        script_id = %manifest.id,
                        method = %assertion.verification_method,
                        verified_at = assertion.verified_at,
                        "security assertion accepted"
                    );
                    return GateDecision::allow(true, true, true);
                }
                Err(rejection) => rejection,
            },
        };

        warn!(script_id = %manifest.id, reason = %rejection, "security gate blocked run");
        GateDecision::block(rejection.to_string())
    }
}
