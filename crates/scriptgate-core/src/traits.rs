//! Trait seams of the scriptgate engine.
//!
//! The engine owns the pipeline order; everything it talks to sits behind
//! one of these traits:
//!
//! - `Runnable`: untrusted script body
//! - `EntrypointLoader`: turns a manifest entrypoint into a `Runnable`
//! - `GateEvaluator`: trusted security gate, consulted before anything runs
//! - `SchemaValidator`: trusted JSON Schema checker for manifests, inputs, results
//! - `CredentialResolver`: maps credential refs to secret values
//! - `EnvelopeSink`: optional recorder for finished envelopes

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use scriptgate_contracts::{
    context::{CredentialResolution, ScriptContext},
    envelope::ExecutionEnvelope,
    error::ScriptGateResult,
    gate::GateDecision,
    manifest::Manifest,
    validation::ValidationReport,
};

/// An error raised by a script body.
///
/// The engine surfaces `message` verbatim in the failed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub message: String,
}

impl ScriptFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptFailure {}

impl From<std::io::Error> for ScriptFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for ScriptFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {err}"))
    }
}

/// A script body exposing the `run(context, inputs) -> result` contract.
///
/// Implementations are **untrusted**. The engine only calls `run()` after the
/// gate allowed the run and the inputs passed schema validation, and it
/// bounds the call with a wall-clock timeout. On timeout the engine stops
/// waiting; releasing external resources is the script's own concern.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Execute the script. The returned value must be a JSON object.
    async fn run(&self, context: ScriptContext, inputs: Value) -> Result<Value, ScriptFailure>;
}

/// Resolves a manifest's entrypoint into something the engine can execute.
pub trait EntrypointLoader: Send + Sync {
    /// `entrypoint` is the absolute, existence-checked entrypoint path.
    fn load(&self, manifest: &Manifest, entrypoint: &Path) -> ScriptGateResult<Arc<dyn Runnable>>;
}

/// The security gate, evaluated before credentials are touched or the script runs.
pub trait GateEvaluator: Send + Sync {
    /// Whether the gate is active. Reported even on runs that fail before evaluation.
    fn is_enabled(&self) -> bool;

    /// Decide whether this run may proceed. `inputs` still carry framework keys.
    fn evaluate(&self, manifest: &Manifest, inputs: &Value, now: i64) -> GateDecision;
}

/// JSON Schema validation used for manifests, inputs, and results.
pub trait SchemaValidator: Send + Sync {
    /// Check that `schema` is a usable schema document. `Err` carries the reason.
    fn check_schema(&self, schema: &Value) -> Result<(), String>;

    /// Validate `instance` against `schema`, collecting every failure.
    fn validate(&self, instance: &Value, schema: &Value) -> ValidationReport;
}

/// Maps `{logical_name: ref}` to secret values.
///
/// Never fails as a whole: refs with no value end up in `unresolved`. May block
/// (e.g. shelling out to a platform secret store); the engine calls it on a
/// blocking worker.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, refs: &BTreeMap<String, String>) -> CredentialResolution;
}

/// Receives every envelope the engine builds.
pub trait EnvelopeSink: Send + Sync {
    fn record(&self, envelope: &ExecutionEnvelope) -> ScriptGateResult<()>;
}
