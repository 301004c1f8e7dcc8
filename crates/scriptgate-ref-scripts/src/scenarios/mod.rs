//! End-to-end scenarios.
//!
//! Each scenario writes the reference script directories under a scratch
//! root, wires real scriptgate components (security gate, JSON Schema
//! validator, credential chain, journal) around the in-process script
//! registry, runs one script, and prints what happened.

use std::{path::Path, sync::Arc};

use serde_json::Value;

use scriptgate_contracts::{envelope::ExecutionEnvelope, error::ScriptGateResult};
use scriptgate_core::{Engine, EngineConfig};
use scriptgate_credentials::{ChainedResolver, MemorySecretStore, ResolverConfig};
use scriptgate_journal::InMemoryJournal;
use scriptgate_security::{GateConfig, SecurityGate};
use scriptgate_verify::JsonSchemaValidator;

use crate::{fixtures, scripts};

pub mod gate;
pub mod results;

/// Signing key shared by the demo gate and the demo assertion issuer.
pub const DEMO_SIGNING_KEY: &str = "scriptgate-demo-signing-key";

/// The verified user in the demo.
pub const DEMO_USER: &str = "+14155550123";

/// Credential ref the demo secret store can answer.
pub const DEMO_PASSWORD_REF: &str = "keychain:united/demo";

/// The gate configuration used by the enforcing scenarios.
pub fn enforcing_gate() -> GateConfig {
    GateConfig {
        enabled: true,
        signing_key: Some(DEMO_SIGNING_KEY.to_string()),
        expected_user_id: Some(DEMO_USER.to_string()),
        contact_hint: Some("approve the login prompt on your phone".to_string()),
        ..GateConfig::default()
    }
}

/// An engine over the reference scripts with the given gate.
///
/// Credentials come from an in-memory store holding one demo password; the
/// process environment is never consulted.
pub fn reference_engine(gate: GateConfig, journal: &InMemoryJournal) -> Engine {
    let mut store = MemorySecretStore::new();
    store.insert("united", Some("demo"), "demo-password");
    let resolver = ChainedResolver::with_env_lookup(ResolverConfig::default(), |_| None)
        .with_store(Box::new(store));

    Engine::new(
        EngineConfig::default(),
        Box::new(SecurityGate::new(gate)),
        Box::new(JsonSchemaValidator::new()),
        Box::new(scripts::registry()),
        Arc::new(resolver),
    )
    .with_sink(Box::new(journal.clone()))
}

/// Write every reference script under `root`.
pub fn install_fixtures(root: &Path) -> ScriptGateResult<()> {
    for fixture in fixtures::all() {
        fixture.write(root)?;
    }
    Ok(())
}

/// Print the interesting parts of an envelope.
pub(crate) fn report(envelope: &ExecutionEnvelope) {
    let gate = &envelope.security_gate;
    println!("  Script:        {} {}", envelope.script_id, envelope.script_version);
    println!(
        "  Gate:          enabled={} risky={} required={} allowed={}",
        gate.enabled, gate.risky, gate.required, gate.allowed
    );
    if let Some(reason) = &gate.reason {
        println!("  Gate reason:   {reason}");
    }
    if !envelope.credential_status.resolved_keys.is_empty() {
        println!("  Credentials:   {}", envelope.credential_status.resolved_keys.join(", "));
    }
    println!("  Mode:          {} (real_data={})", envelope.mode, envelope.real_data);
    match (&envelope.result, &envelope.error) {
        (Some(result), _) => {
            let summary = result.get("summary").and_then(Value::as_str).unwrap_or("-");
            println!("  Result:        OK ({summary})");
        }
        (None, Some(error)) => println!("  Result:        FAILED ({error})"),
        (None, None) => println!("  Result:        FAILED"),
    }
    for warning in &envelope.warnings {
        println!("  Warning:       {warning}");
    }
    println!();
}

/// Run every scenario in order and return the envelopes.
pub async fn run_all(root: &Path) -> ScriptGateResult<Vec<ExecutionEnvelope>> {
    install_fixtures(root)?;
    let journal = InMemoryJournal::new();

    let envelopes = vec![
        gate::gate_disabled(root, &journal).await,
        gate::missing_assertion(root, &journal).await,
        gate::signed_assertion(root, &journal).await?,
        results::placeholder_result(root, &journal).await,
        results::script_failure(root, &journal).await,
        results::output_violation(root, &journal).await,
    ];

    let integrity = journal.verify_integrity();
    println!(
        "  Journal integrity: {} ({} entr{} in chain)",
        if integrity.is_ok() { "VERIFIED" } else { "FAILED" },
        journal.len(),
        if journal.len() == 1 { "y" } else { "ies" }
    );
    Ok(envelopes)
}
