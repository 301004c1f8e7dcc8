//! # scriptgate-verify
//!
//! JSON Schema validation for scriptgate.
//!
//! This crate provides [`engine::JsonSchemaValidator`], which implements the
//! [`scriptgate_core::traits::SchemaValidator`] trait. The engine uses it for
//! three documents per run:
//!
//! 1. the manifest, against the bundled manifest schema
//! 2. the run inputs, against the script's `inputs_schema`
//! 3. the script result, against the script's `outputs_schema`
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use scriptgate_verify::JsonSchemaValidator;
//!
//! let validator = JsonSchemaValidator::new();
//! let report = validator.validate(&inputs, &schema);
//! if !report.passed {
//!     eprintln!("{}", report.summary());
//! }
//! ```

pub mod engine;

pub use engine::JsonSchemaValidator;
