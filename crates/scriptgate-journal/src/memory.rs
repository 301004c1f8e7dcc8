//! In-memory journal.
//!
//! `InMemoryJournal` keeps every entry in a `Vec` behind a `Mutex`, so one
//! journal can be shared by the engine (as its `EnvelopeSink`) and whoever
//! inspects the chain afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use scriptgate_contracts::{
    envelope::ExecutionEnvelope,
    error::{ScriptGateError, ScriptGateResult},
};
use scriptgate_core::traits::EnvelopeSink;

use crate::{
    chain::{hash_entry, verify_chain, ChainBreak},
    entry::JournalEntry,
};

pub(crate) struct ChainState {
    pub(crate) entries: Vec<JournalEntry>,
    pub(crate) last_hash: String,
}

/// An append-only, hash-chained journal held in memory.
///
/// Clones share the same chain.
#[derive(Clone)]
pub struct InMemoryJournal {
    pub(crate) state: Arc<Mutex<ChainState>>,
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                entries: Vec::new(),
                last_hash: JournalEntry::GENESIS_HASH.to_string(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of every entry, in chain order.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `this_hash` of the newest entry, or the genesis hash when empty.
    pub fn terminal_hash(&self) -> String {
        self.lock().last_hash.clone()
    }

    pub fn verify_integrity(&self) -> Result<(), ChainBreak> {
        verify_chain(&self.lock().entries)
    }
}

impl EnvelopeSink for InMemoryJournal {
    fn record(&self, envelope: &ExecutionEnvelope) -> ScriptGateResult<()> {
        let mut state = self.state.lock().map_err(|e| ScriptGateError::Journal {
            reason: format!("journal state lock poisoned: {e}"),
        })?;

        let sequence = state.entries.len() as u64;
        let recorded_at = Utc::now();
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(sequence, &recorded_at, envelope, &prev_hash)?;

        state.entries.push(JournalEntry {
            sequence,
            recorded_at,
            envelope: envelope.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;

        debug!(run_id = %envelope.run_id, sequence, "envelope journaled");
        Ok(())
    }
}
