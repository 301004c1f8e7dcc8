//! # scriptgate-security
//!
//! The security gate for scriptgate runs.
//!
//! ## Overview
//!
//! [`SecurityGate`] implements the
//! [`GateEvaluator`](scriptgate_core::traits::GateEvaluator) trait. It decides
//! whether a run is risky and, if so, whether the caller's signed
//! `security_assertion` is acceptable. Assertions are issued by an
//! out-of-band verification flow (usually after a TOTP check) with
//! [`create_assertion`] and verified with [`verify_assertion`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use scriptgate_security::{GateConfig, SecurityGate};
//!
//! let config = GateConfig::from_file(Path::new("gate.toml"))?
//!     .with_overrides(|key| std::env::var(key).ok())?;
//! let gate = SecurityGate::new(config);
//! // Pass `gate` to `scriptgate_core::Engine::new(...)`.
//! ```

pub mod assertion;
pub mod config;
pub mod gate;
pub mod identity;
pub mod totp;

pub use assertion::{create_assertion, verify_assertion, AssertionError, AssertionRequest, GateRejection};
pub use config::GateConfig;
pub use gate::SecurityGate;
pub use identity::normalize_user_id;
pub use totp::{generate_totp, verify_totp, TotpError};

// ── Tests ─────────────────────────────────────────────────────────────────────
