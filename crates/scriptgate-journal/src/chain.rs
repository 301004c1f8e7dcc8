//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! An entry's hash is the SHA-256 of the RFC 8785 canonical JSON of
//! `{sequence, recorded_at, prev_hash, envelope}`. Canonical JSON keeps the
//! hash stable when an entry is written to disk and read back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use scriptgate_contracts::{
    envelope::ExecutionEnvelope,
    error::{ScriptGateError, ScriptGateResult},
};

use crate::entry::JournalEntry;

#[derive(Serialize)]
struct HashedFields<'a> {
    sequence: u64,
    recorded_at: &'a DateTime<Utc>,
    prev_hash: &'a str,
    envelope: &'a ExecutionEnvelope,
}

/// Lowercase hex SHA-256 committing to one entry's content and its link.
pub fn hash_entry(
    sequence: u64,
    recorded_at: &DateTime<Utc>,
    envelope: &ExecutionEnvelope,
    prev_hash: &str,
) -> ScriptGateResult<String> {
    let canonical = serde_jcs::to_vec(&HashedFields { sequence, recorded_at, prev_hash, envelope })
        .map_err(|e| ScriptGateError::Journal {
            reason: format!("cannot canonicalize envelope {}: {e}", envelope.run_id),
        })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Where and why a chain failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("journal chain broken at entry {index}: {reason}")]
pub struct ChainBreak {
    /// Position of the first bad entry in the slice.
    pub index: usize,
    pub reason: String,
}

/// Check sequence numbering, prev-hash linkage, and every entry's own hash.
///
/// An empty chain is valid.
pub fn verify_chain(entries: &[JournalEntry]) -> Result<(), ChainBreak> {
    let mut expected_prev = JournalEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        let broken = |reason: String| ChainBreak { index, reason };

        if entry.sequence != index as u64 {
            return Err(broken(format!("sequence {} out of place", entry.sequence)));
        }
        if entry.prev_hash != expected_prev {
            return Err(broken("prev_hash does not link to the previous entry".to_string()));
        }
        let recomputed = hash_entry(entry.sequence, &entry.recorded_at, &entry.envelope, &entry.prev_hash)
            .map_err(|e| broken(e.to_string()))?;
        if entry.this_hash != recomputed {
            return Err(broken("this_hash does not match entry content".to_string()));
        }

        expected_prev = entry.this_hash.clone();
    }

    Ok(())
}
