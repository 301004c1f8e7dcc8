//! Schema validator backed by the `jsonschema` crate.
//!
//! `JsonSchemaValidator` implements the `SchemaValidator` trait from
//! `scriptgate-core`. Every violation is collected before returning so the
//! caller sees the full failure set in one pass. The draft is taken from the
//! schema's `$schema` keyword and defaults to the newest supported draft.

use serde_json::Value;
use tracing::{debug, warn};

use scriptgate_contracts::validation::{ValidationFailure, ValidationReport};
use scriptgate_core::traits::SchemaValidator;

/// The scriptgate schema validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaValidator for JsonSchemaValidator {
    /// Compile `schema` without validating anything against it.
    fn check_schema(&self, schema: &Value) -> Result<(), String> {
        jsonschema::validator_for(schema)
            .map(|_| ())
            .map_err(|e| format!("invalid JSON Schema document: {e}"))
    }

    /// Validate `instance` against `schema`.
    ///
    /// A schema that does not compile is reported as a single root-level
    /// failure rather than an error, so the run can still produce an envelope.
    fn validate(&self, instance: &Value, schema: &Value) -> ValidationReport {
        let validator = match jsonschema::validator_for(schema) {
            Ok(validator) => validator,
            Err(e) => {
                let message = format!("invalid JSON Schema document: {e}");
                warn!(%message, "schema compilation failure");
                return ValidationReport::from_failures(vec![ValidationFailure {
                    instance_path: String::new(),
                    message,
                }]);
            }
        };

        let failures: Vec<ValidationFailure> = validator
            .iter_errors(instance)
            .map(|error| ValidationFailure {
                instance_path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        debug!(
            passed = failures.is_empty(),
            failure_count = failures.len(),
            "schema validation complete"
        );
        ValidationReport::from_failures(failures)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use scriptgate_core::traits::SchemaValidator;

    use super::JsonSchemaValidator;

    fn summary_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "total": { "type": "integer", "minimum": 0 }
            },
            "required": ["summary", "total"]
        })
    }

    // ── Passing instances ─────────────────────────────────────────────────────

    #[test]
    fn test_valid_instance_passes() {
        let report = JsonSchemaValidator::new()
            .validate(&json!({ "summary": "3 fares", "total": 3 }), &summary_schema());

        assert!(report.passed, "expected pass, failures: {:?}", report.failures);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let validator = JsonSchemaValidator::new();
        assert!(validator.validate(&json!([1, 2, 3]), &json!({})).passed);
        assert!(validator.validate(&json!(null), &json!(true)).passed);
    }

    // ── Failing instances ─────────────────────────────────────────────────────

    #[test]
    fn test_missing_required_field_fails_at_root() {
        let report = JsonSchemaValidator::new().validate(&json!({ "summary": "x" }), &summary_schema());

        assert!(!report.passed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].instance_path, "");
        assert!(report.failures[0].message.contains("total"));
    }

    #[test]
    fn test_all_violations_are_collected_with_paths() {
        let report = JsonSchemaValidator::new()
            .validate(&json!({ "summary": 7, "total": -1 }), &summary_schema());

        assert!(!report.passed);
        let paths: Vec<&str> = report.failures.iter().map(|f| f.instance_path.as_str()).collect();
        assert!(paths.contains(&"/summary"), "paths: {paths:?}");
        assert!(paths.contains(&"/total"), "paths: {paths:?}");
        assert!(report.summary().contains("at /total"));
    }

    // ── Schema documents ──────────────────────────────────────────────────────

    #[test]
    fn test_check_schema_accepts_valid_document() {
        assert!(JsonSchemaValidator::new().check_schema(&summary_schema()).is_ok());
    }

    #[test]
    fn test_check_schema_rejects_malformed_document() {
        let err = JsonSchemaValidator::new()
            .check_schema(&json!({ "type": "not-a-type" }))
            .unwrap_err();
        assert!(err.contains("invalid JSON Schema document"));
    }

    #[test]
    fn test_malformed_schema_is_a_single_validation_failure() {
        let report = JsonSchemaValidator::new().validate(&json!({}), &json!({ "type": 12 }));

        assert!(!report.passed);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("invalid JSON Schema document"));
    }
}
