//! Security gate assertion and decision types.
//!
//! The gate consumes a manifest plus inputs and produces a `GateDecision`.
//! When a run is risky, the decision depends on a `SecurityAssertion` the
//! caller obtained from an out-of-band verification flow.

use serde::{Deserialize, Serialize};

/// Input key under which callers supply a signed assertion.
pub const SECURITY_ASSERTION_KEY: &str = "security_assertion";

/// Input key under which callers supply credential references.
pub const CREDENTIAL_REFS_KEY: &str = "credential_refs";

/// A signed, time-boxed claim that a human recently completed verification.
///
/// `signature` is the hex HMAC-SHA256 of the canonical JSON of every other
/// field. The signing key never appears in the assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAssertion {
    /// Normalized phone number or email of the verified human.
    pub user_id: String,
    /// Unix seconds at which verification happened.
    pub verified_at: i64,
    /// Unix seconds after which the assertion is no longer accepted.
    pub expires_at: i64,
    /// How the human was verified (e.g. "totp").
    pub verification_method: String,
    /// Random hex string. Not tracked across calls.
    pub nonce: String,
    /// Opaque device/session identifier the assertion is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_binding: Option<String>,
    /// Hex HMAC-SHA256 over the canonical JSON of all other fields.
    pub signature: String,
}

/// The result of evaluating one run request against the security gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the gate is active at all.
    pub enabled: bool,
    /// Whether this particular run needs the gate.
    pub risky: bool,
    /// Final verdict.
    pub allowed: bool,
    /// Whether an assertion was mandatory for this run.
    pub required: bool,
    /// Why the run was blocked. `null` when allowed.
    #[serde(default)]
    pub reason: Option<String>,
}

impl GateDecision {
    /// An allowing decision.
    pub fn allow(enabled: bool, risky: bool, required: bool) -> Self {
        Self { enabled, risky, allowed: true, required, reason: None }
    }

    /// A blocking decision for a risky run on an enabled gate.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            enabled: true,
            risky: true,
            allowed: false,
            required: true,
            reason: Some(reason.into()),
        }
    }

    /// Placeholder for envelopes built before the gate ran (e.g. bad manifest).
    pub fn not_evaluated(enabled: bool) -> Self {
        Self { enabled, ..Self::default() }
    }
}
