//! Journal entry type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scriptgate_contracts::envelope::ExecutionEnvelope;

/// One envelope in the hash chain.
///
/// `this_hash` commits to every other field, and `prev_hash` to the entry
/// before it. Editing any byte of an entry, or dropping or reordering
/// entries, is caught by `verify_chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub envelope: ExecutionEnvelope,
    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl JournalEntry {
    /// The `prev_hash` of the first entry in every journal.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}
