//! JSON Lines journal on disk.
//!
//! One `JournalEntry` per line, appended and never rewritten. Opening an
//! existing file verifies its chain and continues from its last entry.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use tracing::{debug, info};

use scriptgate_contracts::{
    envelope::ExecutionEnvelope,
    error::{ScriptGateError, ScriptGateResult},
};
use scriptgate_core::traits::EnvelopeSink;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::JournalEntry,
};

struct Cursor {
    next_sequence: u64,
    last_hash: String,
}

/// An append-only journal file.
pub struct JsonlJournal {
    path: PathBuf,
    cursor: Mutex<Cursor>,
}

impl JsonlJournal {
    /// Open `path`, creating it on first write.
    ///
    /// # Errors
    ///
    /// `Journal` if the existing file cannot be read, a line is not a valid
    /// entry, or the chain does not verify.
    pub fn open(path: impl Into<PathBuf>) -> ScriptGateResult<Self> {
        let path = path.into();
        let entries = if path.exists() { read_entries(&path)? } else { Vec::new() };
        verify_chain(&entries).map_err(|e| ScriptGateError::Journal {
            reason: format!("'{}': {e}", path.display()),
        })?;

        let cursor = Cursor {
            next_sequence: entries.len() as u64,
            last_hash: entries
                .last()
                .map(|entry| entry.this_hash.clone())
                .unwrap_or_else(|| JournalEntry::GENESIS_HASH.to_string()),
        };
        info!(path = %path.display(), entries = entries.len(), "journal opened");
        Ok(Self { path, cursor: Mutex::new(cursor) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Every entry in the journal file at `path`. Blank lines are skipped.
pub fn read_entries(path: &Path) -> ScriptGateResult<Vec<JournalEntry>> {
    let contents = fs::read_to_string(path).map_err(|e| ScriptGateError::Journal {
        reason: format!("cannot read '{}': {e}", path.display()),
    })?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| ScriptGateError::Journal {
                reason: format!("'{}' line {}: {e}", path.display(), number + 1),
            })
        })
        .collect()
}

impl EnvelopeSink for JsonlJournal {
    fn record(&self, envelope: &ExecutionEnvelope) -> ScriptGateResult<()> {
        let mut cursor = self.cursor.lock().map_err(|e| ScriptGateError::Journal {
            reason: format!("journal cursor lock poisoned: {e}"),
        })?;

        let recorded_at = Utc::now();
        let this_hash = hash_entry(cursor.next_sequence, &recorded_at, envelope, &cursor.last_hash)?;
        let entry = JournalEntry {
            sequence: cursor.next_sequence,
            recorded_at,
            envelope: envelope.clone(),
            prev_hash: cursor.last_hash.clone(),
            this_hash: this_hash.clone(),
        };

        let mut line = serde_json::to_string(&entry).map_err(|e| ScriptGateError::Journal {
            reason: format!("cannot encode entry: {e}"),
        })?;
        line.push('\n');

        let io_err = |e: std::io::Error| ScriptGateError::Journal {
            reason: format!("cannot append to '{}': {e}", self.path.display()),
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        // Only advance once the line is on disk.
        cursor.next_sequence += 1;
        cursor.last_hash = this_hash;
        debug!(run_id = %envelope.run_id, sequence = entry.sequence, "envelope journaled");
        Ok(())
    }
}
