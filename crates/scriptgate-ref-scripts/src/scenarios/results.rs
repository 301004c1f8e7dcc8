//! Scenarios around what a script hands back.
//!
//! The gate is disabled throughout; these runs exercise the result side of
//! the envelope: placeholder detection, script failures, and outputs that do
//! not match the declared schema.

use std::path::Path;

use serde_json::{json, Value};

use scriptgate_contracts::envelope::ExecutionEnvelope;
use scriptgate_journal::InMemoryJournal;
use scriptgate_security::GateConfig;

use super::{reference_engine, report};
use crate::fixtures::{FARE_PREVIEW, FLAKY_CHECKOUT, LOYALTY_SUMMARY};

fn route_inputs() -> Value {
    json!({ "origin": "JFK", "destination": "LHR" })
}

async fn run(root: &Path, journal: &InMemoryJournal, script_id: &str) -> ExecutionEnvelope {
    let engine = reference_engine(GateConfig::default(), journal);
    let envelope = engine.run(&root.join(script_id), route_inputs()).await;
    report(&envelope);
    envelope
}

/// Scenario 3: the script reports placeholder data.
pub async fn placeholder_result(root: &Path, journal: &InMemoryJournal) -> ExecutionEnvelope {
    println!("=== Scenario 3: Placeholder result ===");
    run(root, journal, FARE_PREVIEW).await
}

/// Scenario 4: the script body fails.
pub async fn script_failure(root: &Path, journal: &InMemoryJournal) -> ExecutionEnvelope {
    println!("=== Scenario 4: Script failure ===");
    run(root, journal, FLAKY_CHECKOUT).await
}

/// Scenario 5: the result is missing a field the outputs schema requires.
pub async fn output_violation(root: &Path, journal: &InMemoryJournal) -> ExecutionEnvelope {
    println!("=== Scenario 5: Output schema violation ===");
    run(root, journal, LOYALTY_SUMMARY).await
}

#[cfg(test)]
mod tests {
    use scriptgate_contracts::error::ErrorKind;
    use scriptgate_journal::InMemoryJournal;

    use super::{output_violation, placeholder_result, script_failure};
    use crate::scenarios::{install_fixtures, run_all};

    #[tokio::test]
    async fn test_placeholder_result_is_flagged() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();

        let envelope = placeholder_result(root.path(), &InMemoryJournal::new()).await;

        assert!(envelope.ok, "error: {:?}", envelope.error);
        assert_eq!(envelope.mode, "placeholder");
        assert!(envelope.placeholder);
        assert!(!envelope.real_data);
        assert!(envelope.warnings.iter().any(|w| w.contains("placeholder")));
    }

    #[tokio::test]
    async fn test_script_failure_is_reported() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();

        let envelope = script_failure(root.path(), &InMemoryJournal::new()).await;

        assert!(!envelope.ok);
        assert!(envelope.error.as_deref().unwrap_or_default().contains("boom"));
        assert_eq!(envelope.error_kind, Some(ErrorKind::Execution));
        assert!(!envelope.real_data);
    }

    #[tokio::test]
    async fn test_output_violation_is_reported() {
        let root = tempfile::tempdir().unwrap();
        install_fixtures(root.path()).unwrap();

        let envelope = output_violation(root.path(), &InMemoryJournal::new()).await;

        assert!(!envelope.ok);
        let error = envelope.error.unwrap();
        assert!(error.contains("output schema validation failed"), "error: {error}");
        assert!(error.contains("total"), "error: {error}");
        assert_eq!(envelope.error_kind, Some(ErrorKind::Contract));
    }

    #[tokio::test]
    async fn test_all_scenarios_share_one_valid_journal() {
        let root = tempfile::tempdir().unwrap();

        let envelopes = run_all(root.path()).await.unwrap();

        assert_eq!(envelopes.len(), 6);
        let ok: Vec<bool> = envelopes.iter().map(|e| e.ok).collect();
        assert_eq!(ok, vec![true, false, true, true, false, false]);
    }
}
