//! The execution envelope: the engine's one output contract.
//!
//! Every call to `Engine::run` produces exactly one envelope, successful or
//! not. Envelopes are built once and never modified afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    context::CredentialStatus,
    error::{ErrorKind, ScriptGateError},
    gate::GateDecision,
};

/// Mode reported when the script result does not name one.
pub const DEFAULT_MODE: &str = "live";

/// Mode a script reports when it returns stand-in data.
pub const PLACEHOLDER_MODE: &str = "placeholder";

/// Script id/version pair copied from the manifest (or a fallback when the
/// manifest could not be read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIdentity {
    pub script_id: String,
    pub script_version: String,
}

/// The uniform JSON wrapper returned by every engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEnvelope {
    /// Unique id of this run.
    pub run_id: Uuid,
    pub ok: bool,
    pub script_id: String,
    pub script_version: String,
    /// "live", "placeholder", or any other mode the script reports.
    pub mode: String,
    /// False when the result is placeholder data, or when there is no result.
    pub real_data: bool,
    /// True exactly when `mode == "placeholder"`.
    pub placeholder: bool,
    pub security_gate: GateDecision,
    pub credential_status: CredentialStatus,
    pub warnings: Vec<String>,
    /// The script's result object. Present only when `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Human-readable failure. Present only when not `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category. Present only when not `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Wall-clock time spent inside the engine.
    pub duration_ms: u64,
}

impl ExecutionEnvelope {
    /// Build a successful envelope around a validated result object.
    ///
    /// `mode` and `real_data` are derived from the result; a placeholder
    /// warning is appended when the script ran in placeholder mode.
    pub fn success(
        run_id: Uuid,
        identity: ScriptIdentity,
        security_gate: GateDecision,
        credential_status: CredentialStatus,
        mut warnings: Vec<String>,
        result: Value,
        duration_ms: u64,
    ) -> Self {
        let mode = result
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MODE)
            .to_string();
        let placeholder = mode == PLACEHOLDER_MODE;
        if placeholder {
            warnings.push(
                "script ran in placeholder mode; result does not contain real data".to_string(),
            );
        }

        Self {
            run_id,
            ok: true,
            script_id: identity.script_id,
            script_version: identity.script_version,
            mode,
            real_data: !placeholder,
            placeholder,
            security_gate,
            credential_status,
            warnings,
            result: Some(result),
            error: None,
            error_kind: None,
            duration_ms,
        }
    }

    /// Build a failed envelope from the error that ended the run.
    pub fn failure(
        run_id: Uuid,
        identity: ScriptIdentity,
        security_gate: GateDecision,
        credential_status: CredentialStatus,
        warnings: Vec<String>,
        error: &ScriptGateError,
        duration_ms: u64,
    ) -> Self {
        Self {
            run_id,
            ok: false,
            script_id: identity.script_id,
            script_version: identity.script_version,
            mode: DEFAULT_MODE.to_string(),
            real_data: false,
            placeholder: false,
            security_gate,
            credential_status,
            warnings,
            result: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            duration_ms,
        }
    }
}
