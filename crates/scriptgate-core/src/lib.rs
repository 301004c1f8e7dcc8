//! # scriptgate-core
//!
//! The gate-checked, timeout-bounded execution engine for scriptgate scripts.
//!
//! This crate provides:
//! - The trait seams (`Runnable`, `EntrypointLoader`, `GateEvaluator`,
//!   `SchemaValidator`, `CredentialResolver`, `EnvelopeSink`)
//! - The `Engine` that runs them in the correct trust order
//! - Two entrypoint loaders: a script registry and a child-process loader
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scriptgate_core::{Engine, EngineConfig, loader::ProcessLoader};
//!
//! let engine = Engine::new(EngineConfig::default(), gate, validator, Box::new(ProcessLoader::new()), resolver);
//! let envelope = engine.run(Path::new("scripts/award-search"), inputs).await;
//! ```

pub mod config;
pub mod engine;
pub mod loader;
pub mod traits;

pub use config::EngineConfig;
pub use engine::Engine;
