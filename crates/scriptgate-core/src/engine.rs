//! The scriptgate engine: one script run from manifest to envelope.
//!
//! The engine enforces the run pipeline:
//!
//!   Manifest → Gate → Inputs → Load → Credentials → Execute → Result → Output → Envelope
//!
//! Each stage returns `ScriptGateResult`; the first error ends the run and is
//! converted into a failed envelope. No credential is resolved and no script
//! body runs unless the gate allowed the run. A misbehaving script (error,
//! panic, wrong return type, timeout) can never take the engine down.

use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scriptgate_contracts::{
    context::{CredentialResolution, CredentialStatus, ScriptContext},
    envelope::{ExecutionEnvelope, ScriptIdentity},
    error::{ScriptGateError, ScriptGateResult},
    gate::{GateDecision, CREDENTIAL_REFS_KEY},
    manifest::{Manifest, MANIFEST_FILE},
};

use crate::{
    config::EngineConfig,
    traits::{
        CredentialResolver, EntrypointLoader, EnvelopeSink, GateEvaluator, Runnable,
        SchemaValidator,
    },
};

/// JSON Schema every `manifest.json` must satisfy.
const MANIFEST_SCHEMA: &str = include_str!("../schemas/manifest.schema.json");

/// Bookkeeping gathered while a run advances through the pipeline.
///
/// Whatever stage ends the run, the envelope reports what was known by then.
struct RunTrace {
    identity: ScriptIdentity,
    decision: GateDecision,
    credential_status: CredentialStatus,
    warnings: Vec<String>,
}

/// Executes scripts. Cheap to share behind an `Arc`; `run()` takes `&self`.
pub struct Engine {
    config: EngineConfig,
    gate: Box<dyn GateEvaluator>,
    validator: Box<dyn SchemaValidator>,
    loader: Box<dyn EntrypointLoader>,
    resolver: Arc<dyn CredentialResolver>,
    sink: Option<Box<dyn EnvelopeSink>>,
}

impl Engine {
    /// Create an engine from its trusted components.
    pub fn new(
        config: EngineConfig,
        gate: Box<dyn GateEvaluator>,
        validator: Box<dyn SchemaValidator>,
        loader: Box<dyn EntrypointLoader>,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self { config, gate, validator, loader, resolver, sink: None }
    }

    /// Hand every finished envelope to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn EnvelopeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load `manifest.json` from `script_dir` and check the script's contract.
    ///
    /// # Errors
    ///
    /// - `ManifestNotFound` when there is no manifest file
    /// - `ManifestInvalid` when it is not JSON, violates the manifest schema,
    ///   or declares a path outside the script directory
    /// - `MissingRequiredFile` when the entrypoint or a schema file is absent
    pub fn validate_script(&self, script_dir: &Path) -> ScriptGateResult<Manifest> {
        let manifest_path = script_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ScriptGateError::ManifestNotFound {
                path: manifest_path.display().to_string(),
            });
        }

        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            ScriptGateError::ManifestInvalid {
                reason: format!("cannot read '{}': {e}", manifest_path.display()),
            }
        })?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|e| ScriptGateError::ManifestInvalid {
                reason: format!("manifest is not valid JSON: {e}"),
            })?;

        let schema: Value =
            serde_json::from_str(MANIFEST_SCHEMA).map_err(|e| ScriptGateError::Config {
                reason: format!("embedded manifest schema is not valid JSON: {e}"),
            })?;
        let report = self.validator.validate(&document, &schema);
        if !report.passed {
            return Err(ScriptGateError::ManifestInvalid { reason: report.summary() });
        }

        let manifest: Manifest =
            serde_json::from_value(document).map_err(|e| ScriptGateError::ManifestInvalid {
                reason: e.to_string(),
            })?;

        for (kind, declared) in manifest.declared_paths() {
            let path = sandboxed_path(script_dir, kind, declared)?;
            if !path.is_file() {
                return Err(ScriptGateError::MissingRequiredFile {
                    kind: kind.to_string(),
                    path: path.display().to_string(),
                });
            }
        }

        debug!(script_id = %manifest.id, version = %manifest.version, "manifest validated");
        Ok(manifest)
    }

    /// Run the script in `script_dir` with `inputs`, using the current time.
    pub async fn run(&self, script_dir: &Path, inputs: Value) -> ExecutionEnvelope {
        self.run_at(script_dir, inputs, Utc::now().timestamp()).await
    }

    /// Run the script in `script_dir`, evaluating assertions against `now`
    /// (unix seconds).
    ///
    /// Always returns an envelope. Failures of any stage are reported through
    /// `ok = false`, `error`, and `error_kind`; they are never raised.
    pub async fn run_at(&self, script_dir: &Path, inputs: Value, now: i64) -> ExecutionEnvelope {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut trace = RunTrace {
            identity: fallback_identity(script_dir),
            decision: GateDecision::not_evaluated(self.gate.is_enabled()),
            credential_status: CredentialStatus::default(),
            warnings: Vec::new(),
        };

        info!(run_id = %run_id, script_dir = %script_dir.display(), "run starting");
        let outcome = self.execute_stages(script_dir, &inputs, now, &mut trace).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let envelope = match outcome {
            Ok(result) => {
                info!(run_id = %run_id, script_id = %trace.identity.script_id, duration_ms, "run completed");
                ExecutionEnvelope::success(
                    run_id,
                    trace.identity,
                    trace.decision,
                    trace.credential_status,
                    trace.warnings,
                    result,
                    duration_ms,
                )
            }
            Err(err) => {
                warn!(
                    run_id = %run_id,
                    script_id = %trace.identity.script_id,
                    error_kind = ?err.kind(),
                    error = %err,
                    "run failed"
                );
                ExecutionEnvelope::failure(
                    run_id,
                    trace.identity,
                    trace.decision,
                    trace.credential_status,
                    trace.warnings,
                    &err,
                    duration_ms,
                )
            }
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&envelope) {
                warn!(run_id = %run_id, error = %e, "envelope sink rejected envelope");
            }
        }
        envelope
    }

    /// The pipeline proper. Each block is one state of the run.
    async fn execute_stages(
        &self,
        script_dir: &Path,
        inputs: &Value,
        now: i64,
        trace: &mut RunTrace,
    ) -> ScriptGateResult<Value> {
        // ── ManifestValid ────────────────────────────────────────────────────
        let manifest = self.validate_script(script_dir)?;
        trace.identity = ScriptIdentity {
            script_id: manifest.id.clone(),
            script_version: manifest.version.clone(),
        };

        let script_inputs = self.strip_framework_keys(inputs);
        let requested = collect_credential_refs(inputs, &mut trace.warnings);
        trace.credential_status = CredentialStatus::requested_only(requested.clone());

        // ── GateEvaluated ────────────────────────────────────────────────────
        //
        // Evaluated on the original inputs: the assertion lives in a framework key.
        let decision = self.gate.evaluate(&manifest, inputs, now);
        trace.decision = decision.clone();
        if !decision.allowed {
            return Err(ScriptGateError::SecurityBlocked {
                reason: decision
                    .reason
                    .unwrap_or_else(|| "security gate refused the run".to_string()),
            });
        }
        debug!(script_id = %manifest.id, risky = decision.risky, "security gate allowed run");

        // ── InputsValid ──────────────────────────────────────────────────────
        let input_schema = self.load_schema(script_dir, "inputs_schema", &manifest.inputs_schema)?;
        let output_schema =
            self.load_schema(script_dir, "outputs_schema", &manifest.outputs_schema)?;

        let report = self.validator.validate(&script_inputs, &input_schema);
        if !report.passed {
            return Err(ScriptGateError::InputValidation { reason: report.summary() });
        }

        let entrypoint = sandboxed_path(script_dir, "entrypoint", &manifest.entrypoint)?;
        let runnable = self.loader.load(&manifest, &entrypoint)?;

        let resolution = self.resolve_credentials(&requested).await;
        trace.credential_status = CredentialStatus::from_resolution(requested, &resolution);
        if !resolution.unresolved.is_empty() {
            let names = resolution.unresolved.keys().cloned().collect::<Vec<_>>().join(", ");
            trace.warnings.push(format!("unresolved credential refs: {names}"));
        }

        let context = ScriptContext {
            script_id: manifest.id.clone(),
            script_version: manifest.version.clone(),
            script_dir: script_dir.to_path_buf(),
            credentials: resolution.resolved,
            unresolved_credential_refs: resolution.unresolved,
        };

        // ── Executing ────────────────────────────────────────────────────────
        let result = self.execute(runnable, context, script_inputs).await?;

        // ── Completed → OutputValidated ──────────────────────────────────────
        if !result.is_object() {
            return Err(ScriptGateError::InvalidResult { found: json_type_name(&result).into() });
        }
        let report = self.validator.validate(&result, &output_schema);
        if !report.passed {
            return Err(ScriptGateError::OutputValidation { reason: report.summary() });
        }

        if let Some(extra) = result.get("warnings").and_then(Value::as_array) {
            trace
                .warnings
                .extend(extra.iter().filter_map(Value::as_str).map(str::to_string));
        }

        Ok(result)
    }

    /// Run the script body on its own task, joined with a deadline.
    ///
    /// On timeout the task is detached, not aborted.
    async fn execute(
        &self,
        runnable: Arc<dyn Runnable>,
        context: ScriptContext,
        inputs: Value,
    ) -> ScriptGateResult<Value> {
        let script_id = context.script_id.clone();
        debug!(script_id = %script_id, timeout_secs = self.config.timeout_secs, "executing script body");

        let handle = tokio::spawn(async move { runnable.run(context, inputs).await });

        match tokio::time::timeout(self.config.timeout(), handle).await {
            Err(_elapsed) => {
                warn!(script_id = %script_id, timeout_secs = self.config.timeout_secs, "script timed out");
                Err(ScriptGateError::Timeout { timeout_secs: self.config.timeout_secs })
            }
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "script task was cancelled".to_string()
                };
                Err(ScriptGateError::ScriptRaised { message })
            }
            Ok(Ok(Err(failure))) => Err(ScriptGateError::ScriptRaised { message: failure.message }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }

    async fn resolve_credentials(&self, requested: &BTreeMap<String, String>) -> CredentialResolution {
        if requested.is_empty() {
            return CredentialResolution::default();
        }

        let resolver = Arc::clone(&self.resolver);
        let refs = requested.clone();
        match tokio::task::spawn_blocking(move || resolver.resolve(&refs)).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(error = %e, "credential resolver failed; treating every ref as unresolved");
                CredentialResolution {
                    resolved: BTreeMap::new(),
                    unresolved: requested.clone(),
                }
            }
        }
    }

    fn strip_framework_keys(&self, inputs: &Value) -> Value {
        let mut stripped = inputs.clone();
        if let Some(map) = stripped.as_object_mut() {
            for key in &self.config.framework_keys {
                map.remove(key);
            }
        }
        stripped
    }

    fn load_schema(&self, script_dir: &Path, kind: &str, declared: &str) -> ScriptGateResult<Value> {
        let path = sandboxed_path(script_dir, kind, declared)?;
        let schema_error = |reason: String| ScriptGateError::SchemaDocument {
            path: path.display().to_string(),
            reason,
        };

        let raw = fs::read_to_string(&path).map_err(|e| schema_error(e.to_string()))?;
        let schema: Value = serde_json::from_str(&raw).map_err(|e| schema_error(e.to_string()))?;
        self.validator.check_schema(&schema).map_err(schema_error)?;
        Ok(schema)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Join `declared` onto `script_dir`, refusing absolute paths and `..`.
fn sandboxed_path(script_dir: &Path, kind: &str, declared: &str) -> ScriptGateResult<PathBuf> {
    let relative = Path::new(declared);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ScriptGateError::ManifestInvalid {
            reason: format!("{kind} path '{declared}' must stay inside the script directory"),
        });
    }
    Ok(script_dir.join(relative))
}

/// Identity reported when the manifest could not be read.
fn fallback_identity(script_dir: &Path) -> ScriptIdentity {
    let script_id = script_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| script_dir.display().to_string());
    ScriptIdentity { script_id, script_version: "unknown".to_string() }
}

/// Extract `{logical_name: ref}` from `inputs.credential_refs`.
///
/// Non-string refs are skipped with a warning.
fn collect_credential_refs(inputs: &Value, warnings: &mut Vec<String>) -> BTreeMap<String, String> {
    let mut refs = BTreeMap::new();
    match inputs.get(CREDENTIAL_REFS_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, reference) in map {
                match reference.as_str() {
                    Some(r) => {
                        refs.insert(name.clone(), r.to_string());
                    }
                    None => warnings.push(format!("credential ref '{name}' is not a string; ignored")),
                }
            }
        }
        Some(_) => warnings.push(format!("{CREDENTIAL_REFS_KEY} must be an object; ignored")),
    }
    refs
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("script panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("script panicked: {s}")
    } else {
        "script panicked".to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        fs,
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use scriptgate_contracts::{
        context::{CredentialResolution, ScriptContext},
        envelope::ExecutionEnvelope,
        error::{ErrorKind, ScriptGateError, ScriptGateResult},
        gate::GateDecision,
        manifest::Manifest,
        validation::{ValidationFailure, ValidationReport},
    };

    use crate::{
        config::EngineConfig,
        loader::ScriptRegistry,
        traits::{
            CredentialResolver, EnvelopeSink, GateEvaluator, Runnable, SchemaValidator,
            ScriptFailure,
        },
    };

    use super::Engine;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A gate that returns a fixed decision and remembers the inputs it saw.
    struct MockGate {
        decision: GateDecision,
        seen_inputs: Arc<Mutex<Vec<Value>>>,
    }

    impl MockGate {
        fn allowing() -> Self {
            Self {
                decision: GateDecision::allow(false, false, false),
                seen_inputs: Arc::new(Mutex::new(vec![])),
            }
        }

        fn blocking(reason: &str) -> Self {
            Self {
                decision: GateDecision::block(reason),
                seen_inputs: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl GateEvaluator for MockGate {
        fn is_enabled(&self) -> bool {
            self.decision.enabled
        }

        fn evaluate(&self, _manifest: &Manifest, inputs: &Value, _now: i64) -> GateDecision {
            self.seen_inputs.lock().unwrap().push(inputs.clone());
            self.decision.clone()
        }
    }

    /// Checks only the top-level `required` keys of a schema.
    struct RequiredKeysValidator;

    impl SchemaValidator for RequiredKeysValidator {
        fn check_schema(&self, schema: &Value) -> Result<(), String> {
            if schema.is_object() {
                Ok(())
            } else {
                Err("schema must be an object".to_string())
            }
        }

        fn validate(&self, instance: &Value, schema: &Value) -> ValidationReport {
            let required = schema
                .get("required")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let failures = required
                .iter()
                .filter_map(Value::as_str)
                .filter(|key| instance.get(*key).is_none())
                .map(|key| ValidationFailure {
                    instance_path: String::new(),
                    message: format!("\"{key}\" is a required property"),
                })
                .collect();
            ValidationReport::from_failures(failures)
        }
    }

    /// Resolves refs found in a fixed table and counts calls.
    struct TableResolver {
        table: BTreeMap<String, String>,
        calls: Arc<Mutex<u32>>,
    }

    impl CredentialResolver for TableResolver {
        fn resolve(&self, refs: &BTreeMap<String, String>) -> CredentialResolution {
            *self.calls.lock().unwrap() += 1;
            let mut resolution = CredentialResolution::default();
            for (name, reference) in refs {
                match self.table.get(reference) {
                    Some(value) => {
                        resolution.resolved.insert(name.clone(), value.clone());
                    }
                    None => {
                        resolution.unresolved.insert(name.clone(), reference.clone());
                    }
                }
            }
            resolution
        }
    }

    fn empty_resolver() -> Arc<TableResolver> {
        Arc::new(TableResolver { table: BTreeMap::new(), calls: Arc::new(Mutex::new(0)) })
    }

    /// Records every envelope it receives.
    struct CollectingSink {
        envelopes: Arc<Mutex<Vec<ExecutionEnvelope>>>,
    }

    impl EnvelopeSink for CollectingSink {
        fn record(&self, envelope: &ExecutionEnvelope) -> ScriptGateResult<()> {
            self.envelopes.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    /// A script body with a scripted behaviour, counting invocations.
    enum Behaviour {
        Return(Value),
        EchoInputs,
        EchoContext,
        Fail(&'static str),
        Panic(&'static str),
        Sleep(Duration),
    }

    struct MockScript {
        behaviour: Behaviour,
        calls: Arc<Mutex<u32>>,
    }

    impl MockScript {
        fn new(behaviour: Behaviour) -> Self {
            Self { behaviour, calls: Arc::new(Mutex::new(0)) }
        }
    }

    #[async_trait]
    impl Runnable for MockScript {
        async fn run(&self, context: ScriptContext, inputs: Value) -> Result<Value, ScriptFailure> {
            *self.calls.lock().unwrap() += 1;
            match &self.behaviour {
                Behaviour::Return(value) => Ok(value.clone()),
                Behaviour::EchoInputs => Ok(json!({ "summary": "echo", "inputs": inputs })),
                Behaviour::EchoContext => Ok(json!({
                    "summary": "context",
                    "credentials": context.credentials,
                    "unresolved": context.unresolved_credential_refs,
                })),
                Behaviour::Fail(message) => Err(ScriptFailure::new(*message)),
                Behaviour::Panic(message) => panic!("{}", message),
                Behaviour::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(json!({ "summary": "late" }))
                }
            }
        }
    }

    /// Write a minimal script directory: manifest, schemas, entrypoint.
    fn write_script(dir: &Path, manifest: Value) {
        fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
        fs::write(
            dir.join("inputs.schema.json"),
            json!({ "type": "object", "required": ["origin"] }).to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("outputs.schema.json"),
            json!({ "type": "object", "required": ["summary"] }).to_string(),
        )
        .unwrap();
        fs::write(dir.join("main.sh"), "#!/bin/sh\n").unwrap();
    }

    fn manifest() -> Value {
        json!({
            "id": "award-search",
            "version": "1.0.0",
            "entrypoint": "main.sh",
            "inputs_schema": "inputs.schema.json",
            "outputs_schema": "outputs.schema.json",
            "permissions": { "browser": false, "network_domains": [] },
            "requires_human_steps": []
        })
    }

    fn engine_with(
        gate: MockGate,
        script: Arc<MockScript>,
        resolver: Arc<TableResolver>,
        config: EngineConfig,
    ) -> Engine {
        let mut registry = ScriptRegistry::new();
        registry.register("award-search", script);
        Engine::new(config, Box::new(gate), Box::new(RequiredKeysValidator), Box::new(registry), resolver)
    }

    fn simple_engine(script: Arc<MockScript>) -> Engine {
        engine_with(MockGate::allowing(), script, empty_resolver(), EngineConfig::default())
    }

    // ── validate_script ──────────────────────────────────────────────────────

    #[test]
    fn test_missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        match engine.validate_script(dir.path()) {
            Err(ScriptGateError::ManifestNotFound { path }) => assert!(path.ends_with("manifest.json")),
            other => panic!("expected ManifestNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_manifest_missing_required_field_is_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = manifest();
        bad.as_object_mut().unwrap().remove("version");
        write_script(dir.path(), bad);
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        match engine.validate_script(dir.path()) {
            Err(ScriptGateError::ManifestInvalid { reason }) => assert!(reason.contains("version")),
            other => panic!("expected ManifestInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_manifest_not_json_is_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("manifest.json"), "{ not json").unwrap();
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        assert!(matches!(
            engine.validate_script(dir.path()),
            Err(ScriptGateError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn test_missing_entrypoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        fs::remove_file(dir.path().join("main.sh")).unwrap();
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        match engine.validate_script(dir.path()) {
            Err(ScriptGateError::MissingRequiredFile { kind, .. }) => assert_eq!(kind, "entrypoint"),
            other => panic!("expected MissingRequiredFile, got {:?}", other),
        }
    }

    #[test]
    fn test_paths_may_not_escape_script_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut escaping = manifest();
        escaping["outputs_schema"] = json!("../outputs.schema.json");
        write_script(dir.path(), escaping);
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        match engine.validate_script(dir.path()) {
            Err(ScriptGateError::ManifestInvalid { reason }) => {
                assert!(reason.contains("outputs_schema"), "unexpected reason: {reason}")
            }
            other => panic!("expected ManifestInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_script_returns_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)));

        let manifest = engine.validate_script(dir.path()).unwrap();
        assert_eq!(manifest.id, "award-search");
        assert_eq!(manifest.version, "1.0.0");
    }

    // ── run ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_successful_run_wraps_result() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let script = Arc::new(MockScript::new(Behaviour::EchoInputs));
        let engine = simple_engine(script.clone());

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(envelope.ok, "unexpected failure: {:?}", envelope.error);
        assert_eq!(envelope.script_id, "award-search");
        assert_eq!(envelope.script_version, "1.0.0");
        assert_eq!(envelope.mode, "live");
        assert!(envelope.real_data);
        assert_eq!(envelope.result.unwrap()["inputs"]["origin"], json!("SFO"));
        assert_eq!(*script.calls.lock().unwrap(), 1);
    }

    /// Core security test: a blocked gate must prevent credential resolution
    /// and script execution.
    #[tokio::test]
    async fn test_gate_block_prevents_execution() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let script = Arc::new(MockScript::new(Behaviour::EchoInputs));
        let resolver = empty_resolver();
        let resolver_calls = resolver.calls.clone();
        let engine = engine_with(
            MockGate::blocking("missing security_assertion"),
            script.clone(),
            resolver,
            EngineConfig::default(),
        );

        let envelope = engine
            .run(
                dir.path(),
                json!({ "origin": "SFO", "credential_refs": { "password": "united/password" } }),
            )
            .await;

        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ErrorKind::Security));
        assert!(envelope.error.unwrap().contains("missing security_assertion"));
        assert!(!envelope.security_gate.allowed);
        assert_eq!(*script.calls.lock().unwrap(), 0, "script must not run when blocked");
        assert_eq!(*resolver_calls.lock().unwrap(), 0, "credentials must not resolve when blocked");
        assert!(envelope.credential_status.requested_refs.contains_key("password"));
        assert!(envelope.credential_status.resolved_keys.is_empty());
    }

    #[tokio::test]
    async fn test_framework_keys_reach_gate_but_not_script() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let gate = MockGate::allowing();
        let seen = gate.seen_inputs.clone();
        let engine = engine_with(
            gate,
            Arc::new(MockScript::new(Behaviour::EchoInputs)),
            empty_resolver(),
            EngineConfig::default(),
        );

        let envelope = engine
            .run(dir.path(), json!({ "origin": "SFO", "security_assertion": { "nonce": "n" } }))
            .await;

        assert!(envelope.ok);
        assert!(seen.lock().unwrap()[0].get("security_assertion").is_some());
        assert!(envelope.result.unwrap()["inputs"].get("security_assertion").is_none());
    }

    #[tokio::test]
    async fn test_input_schema_violation_fails_before_execution() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let script = Arc::new(MockScript::new(Behaviour::EchoInputs));
        let engine = simple_engine(script.clone());

        let envelope = engine.run(dir.path(), json!({ "destination": "EWR" })).await;

        assert!(!envelope.ok);
        assert!(envelope.error.unwrap().starts_with("input schema validation failed"));
        assert_eq!(*script.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_script_failure_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::Fail("boom"))));

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ErrorKind::Execution));
        assert!(envelope.error.unwrap().contains("boom"));
        assert!(envelope.result.is_none());
    }

    #[tokio::test]
    async fn test_script_panic_does_not_crash_engine() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::Panic("kaboom"))));

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(!envelope.ok);
        assert!(envelope.error.unwrap().contains("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_produces_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let config = EngineConfig { timeout_secs: 2, ..EngineConfig::default() };
        let engine = engine_with(
            MockGate::allowing(),
            Arc::new(MockScript::new(Behaviour::Sleep(Duration::from_secs(3600)))),
            empty_resolver(),
            config,
        );

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(!envelope.ok);
        assert_eq!(envelope.error.as_deref(), Some("script exceeded timeout of 2s"));
    }

    #[tokio::test]
    async fn test_non_object_result_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::Return(json!(["a", "b"])))));

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(!envelope.ok);
        assert_eq!(
            envelope.error.as_deref(),
            Some("script returned an array, expected a JSON object")
        );
    }

    #[tokio::test]
    async fn test_output_schema_violation_is_distinct_from_raise() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine =
            simple_engine(Arc::new(MockScript::new(Behaviour::Return(json!({ "total": 3 })))));

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ErrorKind::Contract));
        assert!(envelope.error.unwrap().contains("output schema validation failed"));
    }

    #[tokio::test]
    async fn test_credentials_resolve_into_context_and_status() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let resolver = Arc::new(TableResolver {
            table: [("united/password".to_string(), "hunter2".to_string())].into_iter().collect(),
            calls: Arc::new(Mutex::new(0)),
        });
        let engine = engine_with(
            MockGate::allowing(),
            Arc::new(MockScript::new(Behaviour::EchoContext)),
            resolver,
            EngineConfig::default(),
        );

        let envelope = engine
            .run(
                dir.path(),
                json!({
                    "origin": "SFO",
                    "credential_refs": { "password": "united/password", "pin": "bank/pin" }
                }),
            )
            .await;

        assert!(envelope.ok, "unexpected failure: {:?}", envelope.error);
        let result = envelope.result.clone().unwrap();
        assert_eq!(result["credentials"]["password"], json!("hunter2"));
        assert_eq!(result["unresolved"]["pin"], json!("bank/pin"));

        let status = &envelope.credential_status;
        assert_eq!(status.resolved_keys, vec!["password".to_string()]);
        assert_eq!(status.unresolved_refs.get("pin").map(String::as_str), Some("bank/pin"));
        assert!(envelope.warnings.iter().any(|w| w.contains("pin")));
        assert!(!serde_json::to_string(&envelope.credential_status).unwrap().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_sink_receives_failed_envelopes_too() {
        let dir = tempfile::tempdir().unwrap();
        let envelopes = Arc::new(Mutex::new(vec![]));
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::EchoInputs)))
            .with_sink(Box::new(CollectingSink { envelopes: envelopes.clone() }));

        let envelope = engine.run(dir.path(), json!({})).await;

        assert!(!envelope.ok);
        assert_eq!(envelope.error_kind, Some(ErrorKind::Contract));
        let recorded = envelopes.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].run_id, envelope.run_id);
    }

    #[tokio::test]
    async fn test_result_warnings_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), manifest());
        let engine = simple_engine(Arc::new(MockScript::new(Behaviour::Return(json!({
            "summary": "ok",
            "mode": "placeholder",
            "warnings": ["login page changed"]
        })))));

        let envelope = engine.run(dir.path(), json!({ "origin": "SFO" })).await;

        assert!(envelope.ok);
        assert!(envelope.placeholder);
        assert!(envelope.warnings.iter().any(|w| w == "login page changed"));
        assert!(envelope.warnings.iter().any(|w| w.contains("placeholder")));
    }
}
