//! Schema validation report types.
//!
//! The engine validates manifests, inputs, and results through a
//! `SchemaValidator`; each call yields one `ValidationReport`.

use serde::{Deserialize, Serialize};

/// The outcome of validating one JSON instance against one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True only if no failures were found.
    pub passed: bool,
    /// Every violation found. Empty on pass.
    pub failures: Vec<ValidationFailure>,
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// JSON pointer to the offending part of the instance ("" for the root).
    pub instance_path: String,
    pub message: String,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self { passed: true, failures: Vec::new() }
    }

    pub fn from_failures(failures: Vec<ValidationFailure>) -> Self {
        Self { passed: failures.is_empty(), failures }
    }

    /// All failures joined into one line, e.g. `"at /total: \"total\" is required"`.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| {
                if f.instance_path.is_empty() {
                    f.message.clone()
                } else {
                    format!("at {}: {}", f.instance_path, f.message)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
