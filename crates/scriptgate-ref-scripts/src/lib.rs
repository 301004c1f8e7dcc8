//! # scriptgate-ref-scripts
//!
//! Reference scripts for the scriptgate engine.
//!
//! Demonstrates the engine end to end with fictional award-travel scripts:
//!
//! 1. **Gate disabled**: a 2FA-protected search is risky but still runs.
//! 2. **Gate enforced**: the same search is blocked without a signed
//!    assertion, and allowed (with its password resolved) with one.
//! 3. **Placeholder result**: canned data is flagged as not real.
//! 4. **Script failure**: a failing body yields a failed envelope.
//! 5. **Output violation**: a result missing a required field is rejected.
//!
//! All data is hardcoded and fictional. No external sites are contacted.

pub mod fixtures;
pub mod scenarios;
pub mod scripts;
