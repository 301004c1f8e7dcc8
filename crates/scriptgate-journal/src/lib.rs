//! # scriptgate-journal
//!
//! Append-only, SHA-256 hash-chained journal of execution envelopes.
//!
//! ## Overview
//!
//! Every envelope the engine produces can be handed to an `EnvelopeSink`.
//! The journals in this crate wrap each envelope in a `JournalEntry` linked
//! to the previous entry by its hash. Tampering with any entry, even a
//! single byte, breaks the chain and is reported by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scriptgate_journal::JsonlJournal;
//!
//! let journal = JsonlJournal::open("runs.jsonl")?;
//! let engine = engine.with_sink(Box::new(journal));
//! // later
//! scriptgate_journal::verify_chain(&scriptgate_journal::read_entries(path)?)?;
//! ```

pub mod chain;
pub mod entry;
pub mod file;
pub mod memory;

pub use chain::{hash_entry, verify_chain, ChainBreak};
pub use entry::JournalEntry;
pub use file::{read_entries, JsonlJournal};
pub use memory::InMemoryJournal;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use scriptgate_contracts::{
        context::CredentialStatus,
        envelope::{ExecutionEnvelope, ScriptIdentity},
        error::ScriptGateError,
        gate::GateDecision,
    };
    use scriptgate_core::traits::EnvelopeSink;

    use super::{read_entries, verify_chain, InMemoryJournal, JournalEntry, JsonlJournal};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn envelope(summary: &str) -> ExecutionEnvelope {
        ExecutionEnvelope::success(
            Uuid::new_v4(),
            ScriptIdentity { script_id: "award-search".to_string(), script_version: "1.0.0".to_string() },
            GateDecision::allow(false, false, false),
            CredentialStatus::default(),
            Vec::new(),
            json!({ "summary": summary, "fare": 412.5 }),
            12,
        )
    }

    fn failed() -> ExecutionEnvelope {
        ExecutionEnvelope::failure(
            Uuid::new_v4(),
            ScriptIdentity { script_id: "award-search".to_string(), script_version: "1.0.0".to_string() },
            GateDecision::block("missing security_assertion"),
            CredentialStatus::default(),
            Vec::new(),
            &ScriptGateError::SecurityBlocked { reason: "missing security_assertion".to_string() },
            1,
        )
    }

    // ── In memory ─────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let journal = InMemoryJournal::new();
        journal.record(&envelope("first")).unwrap();
        journal.record(&failed()).unwrap();
        journal.record(&envelope("third")).unwrap();

        assert_eq!(journal.len(), 3);
        assert!(journal.verify_integrity().is_ok());
    }

    #[test]
    fn test_genesis_and_sequence() {
        let journal = InMemoryJournal::new();
        assert!(journal.is_empty());
        assert_eq!(journal.terminal_hash(), JournalEntry::GENESIS_HASH);

        journal.record(&envelope("a")).unwrap();
        journal.record(&envelope("b")).unwrap();

        let entries = journal.entries();
        assert_eq!(entries[0].prev_hash, JournalEntry::GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].this_hash);
        assert_eq!(journal.terminal_hash(), entries[1].this_hash);
        for (idx, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
    }

    #[test]
    fn test_tamper_detection() {
        let journal = InMemoryJournal::new();
        journal.record(&envelope("a")).unwrap();
        journal.record(&envelope("b")).unwrap();

        {
            let mut state = journal.state.lock().unwrap();
            state.entries[0].envelope.ok = false;
        }

        let broken = journal.verify_integrity().unwrap_err();
        assert_eq!(broken.index, 0);
    }

    #[test]
    fn test_dropped_entry_is_detected() {
        let journal = InMemoryJournal::new();
        journal.record(&envelope("a")).unwrap();
        journal.record(&envelope("b")).unwrap();
        journal.record(&envelope("c")).unwrap();

        let mut entries = journal.entries();
        entries.remove(1);
        assert_eq!(verify_chain(&entries).unwrap_err().index, 1);
    }

    #[test]
    fn test_verify_empty() {
        assert!(verify_chain(&[]).is_ok());
        assert!(InMemoryJournal::new().verify_integrity().is_ok());
    }

    // ── On disk ───────────────────────────────────────────────────────────────

    #[test]
    fn test_file_journal_round_trips_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let journal = JsonlJournal::open(&path).unwrap();
        journal.record(&envelope("a")).unwrap();
        journal.record(&failed()).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(verify_chain(&entries).is_ok());
        assert_eq!(entries[1].envelope.error.as_deref(), Some("security gate blocked run: missing security_assertion"));
    }

    #[test]
    fn test_reopened_file_journal_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        JsonlJournal::open(&path).unwrap().record(&envelope("a")).unwrap();
        let reopened = JsonlJournal::open(&path).unwrap();
        reopened.record(&envelope("b")).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 1);
        assert!(verify_chain(&entries).is_ok());
    }

    #[test]
    fn test_tampered_file_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let journal = JsonlJournal::open(&path).unwrap();
        journal.record(&envelope("original")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replace("original", "forged")).unwrap();

        assert!(matches!(JsonlJournal::open(&path), Err(ScriptGateError::Journal { .. })));
    }

    #[test]
    fn test_garbage_line_is_a_journal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        match read_entries(&path) {
            Err(ScriptGateError::Journal { reason }) => assert!(reason.contains("line 1")),
            other => panic!("expected Journal error, got {:?}", other),
        }
    }
}
