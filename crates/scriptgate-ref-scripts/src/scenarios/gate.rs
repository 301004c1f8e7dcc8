//! Scenarios around the security gate.
//!
//! The award search declares an "Enter 2FA code" human step, so it is always
//! risky. What happens next depends on the gate:
//!
//! - disabled: the run goes ahead and the envelope still reports `risky`
//! - enabled, no assertion: blocked before the script is loaded
//! - enabled, signed assertion: allowed, and the password credential resolves

use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};

use scriptgate_contracts::{
    envelope::ExecutionEnvelope,
    error::{ScriptGateError, ScriptGateResult},
    gate::{CREDENTIAL_REFS_KEY, SECURITY_ASSERTION_KEY},
};
use scriptgate_journal::InMemoryJournal;
use scriptgate_security::{create_assertion, AssertionRequest, GateConfig};

use super::{enforcing_gate, reference_engine, report, DEMO_PASSWORD_REF, DEMO_SIGNING_KEY, DEMO_USER};
use crate::fixtures::AWARD_SEARCH;

fn route_inputs() -> Value {
    json!({ "origin": "SFO", "destination": "NRT" })
}

/// Scenario 1: risky script, gate disabled.
pub async fn gate_disabled(root: &Path, journal: &InMemoryJournal) -> ExecutionEnvelope {
    println!("=== Scenario 1: Risky script with the gate disabled ===");
    let engine = reference_engine(GateConfig::default(), journal);
    let envelope = engine.run(&root.join(AWARD_SEARCH), route_inputs()).await;
    report(&envelope);
    envelope
}

/// Scenario 2: risky script, gate enabled, no assertion supplied.
pub async fn missing_assertion(root: &Path, journal: &InMemoryJournal) -> ExecutionEnvelope {
    println!("=== Scenario 2: Risky script without a security assertion ===");
    let engine = reference_engine(enforcing_gate(), journal);
    let envelope = engine.run(&root.join(AWARD_SEARCH), route_inputs()).await;
    report(&envelope);
    envelope
}

/// Scenario 2b: the same run with a freshly signed assertion and a
/// credential ref.
pub async fn signed_assertion(
    root: &Path,
    journal: &InMemoryJournal,
) -> ScriptGateResult<ExecutionEnvelope> {
    println!("=== Scenario 2b: Risky script with a signed security assertion ===");
    let assertion = create_assertion(&AssertionRequest::new(DEMO_USER), DEMO_SIGNING_KEY, Utc::now().timestamp())
        .map_err(|e| ScriptGateError::Config { reason: format!("cannot issue demo assertion: {e}") })?;
    let assertion = serde_json::to_value(assertion)
        .map_err(|e| ScriptGateError::Config { reason: format!("cannot encode demo assertion: {e}") })?;

    let mut inputs = route_inputs();
    inputs[SECURITY_ASSERTION_KEY] = assertion;
    inputs[CREDENTIAL_REFS_KEY] = json!({ "password": DEMO_PASSWORD_REF });

    let engine = reference_engine(enforcing_gate(), journal);
    let envelope = engine.run(&root.join(AWARD_SEARCH), inputs).await;
    report(&envelope);
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use scriptgate_contracts::error::ErrorKind;
    use scriptgate_journal::InMemoryJournal;

    use super::{gate_disabled, missing_assertion, signed_assertion};
    use crate::scenarios::install_fixtures;

    #[tokio::test]
    async fn test_disabled_gate_runs_risky_script() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();

        let envelope = gate_disabled(root.path(), &InMemoryJournal::new()).await;

        assert!(envelope.ok, "error: {:?}", envelope.error);
        assert!(envelope.security_gate.risky);
        assert!(envelope.security_gate.allowed);
        assert!(!envelope.security_gate.enabled);
        assert!(!envelope.security_gate.required);
        assert_eq!(envelope.mode, "live");
        assert!(envelope.real_data);
        assert!(envelope.warnings.iter().any(|w| w.contains("not logged in")));
        let result = envelope.result.unwrap();
        assert_eq!(result["fares"].as_array().unwrap().len(), 2);
        assert!(result["warnings"][0].as_str().unwrap().contains("not logged in"));
    }

    #[tokio::test]
    async fn test_enabled_gate_blocks_without_assertion() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();

        let envelope = missing_assertion(root.path(), &InMemoryJournal::new()).await;

        assert!(!envelope.ok);
        assert!(!envelope.security_gate.allowed);
        assert!(envelope.security_gate.required);
        assert_eq!(envelope.error_kind, Some(ErrorKind::Security));
        let error = envelope.error.unwrap();
        assert!(error.contains("missing security_assertion"), "error: {error}");
        assert!(error.contains("approve the login prompt"), "error: {error}");
        assert!(envelope.result.is_none());
    }

    #[tokio::test]
    async fn test_signed_assertion_allows_and_resolves_credentials() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();
        let journal = InMemoryJournal::new();

        let envelope = signed_assertion(root.path(), &journal).await.unwrap();

        assert!(envelope.ok, "error: {:?}", envelope.error);
        assert!(envelope.security_gate.enabled && envelope.security_gate.allowed);
        assert!(envelope.security_gate.risky && envelope.security_gate.required);
        assert_eq!(envelope.credential_status.resolved_keys, vec!["password".to_string()]);
        assert!(envelope.credential_status.unresolved_refs.is_empty());
        assert_eq!(envelope.result.unwrap()["warnings"], serde_json::json!([]));
        assert_eq!(journal.len(), 1);
    }
}
