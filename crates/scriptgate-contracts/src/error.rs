//! Error types for the scriptgate pipeline.
//!
//! Every stage of an engine run returns `ScriptGateResult<T>`. The engine
//! converts the first error it meets into a failed envelope, so the `Display`
//! strings below are what callers read in `envelope.error`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for scriptgate.
#[derive(Debug, Error)]
pub enum ScriptGateError {
    /// No `manifest.json` in the script directory.
    #[error("manifest not found: {path}")]
    ManifestNotFound { path: String },

    /// The manifest is not valid JSON or violates the manifest schema.
    #[error("manifest schema violation: {reason}")]
    ManifestInvalid { reason: String },

    /// A file the manifest declares does not exist.
    #[error("missing required file ({kind}): {path}")]
    MissingRequiredFile { kind: String, path: String },

    /// A declared JSON Schema document cannot be read or compiled.
    #[error("invalid schema document '{path}': {reason}")]
    SchemaDocument { path: String, reason: String },

    /// Inputs do not satisfy the script's input schema.
    #[error("input schema validation failed: {reason}")]
    InputValidation { reason: String },

    /// The script's result does not satisfy its output schema.
    #[error("output schema validation failed: {reason}")]
    OutputValidation { reason: String },

    /// The security gate refused the run.
    #[error("security gate blocked run: {reason}")]
    SecurityBlocked { reason: String },

    /// The entrypoint could not be turned into a runnable.
    #[error("failed to load entrypoint: {reason}")]
    EntrypointLoad { reason: String },

    /// The script body returned an error or panicked.
    #[error("script raised: {message}")]
    ScriptRaised { message: String },

    /// The script returned something other than a JSON object.
    #[error("script returned {found}, expected a JSON object")]
    InvalidResult { found: String },

    /// The script did not finish within the configured wall-clock limit.
    #[error("script exceeded timeout of {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// A configuration value is missing or malformed.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// An envelope could not be appended to the run journal.
    #[error("journal write failed: {reason}")]
    Journal { reason: String },

    /// A run id was enqueued while already queued or running.
    #[error("run '{run_id}' is already queued or running")]
    DuplicateRun { run_id: String },
}

/// Coarse category of a `ScriptGateError`, reported in envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Manifest, file, or schema problems the script author can fix.
    Contract,
    /// The security gate blocked the run.
    Security,
    /// The script failed, misbehaved, or timed out.
    Execution,
    /// Operator configuration or bookkeeping failures.
    Config,
}

impl ScriptGateError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestNotFound { .. }
            | Self::ManifestInvalid { .. }
            | Self::MissingRequiredFile { .. }
            | Self::SchemaDocument { .. }
            | Self::InputValidation { .. }
            | Self::OutputValidation { .. } => ErrorKind::Contract,
            Self::SecurityBlocked { .. } => ErrorKind::Security,
            Self::EntrypointLoad { .. }
            | Self::ScriptRaised { .. }
            | Self::InvalidResult { .. }
            | Self::Timeout { .. } => ErrorKind::Execution,
            Self::Config { .. } | Self::Journal { .. } | Self::DuplicateRun { .. } => {
                ErrorKind::Config
            }
        }
    }
}

/// Convenience alias used throughout the scriptgate crates.
pub type ScriptGateResult<T> = Result<T, ScriptGateError>;
