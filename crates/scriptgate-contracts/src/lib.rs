//! # scriptgate-contracts
//!
//! Shared types and contracts for the scriptgate execution engine.
//!
//! Every crate in the workspace imports from here. No pipeline logic lives in
//! this crate: only data definitions, the envelope constructors, and the
//! error type.

pub mod context;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod manifest;
pub mod schedule;
pub mod validation;
