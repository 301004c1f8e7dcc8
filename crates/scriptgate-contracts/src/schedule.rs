//! Run-queue request and snapshot types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;

/// A queued unit of work for the run scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunRequest {
    /// Unique id of the run. The scheduler rejects duplicates.
    pub run_id: String,
    pub script_id: String,
    /// Named resources the run needs exclusive access to.
    #[serde(default)]
    pub required_locks: Vec<String>,
}

impl RunRequest {
    pub fn new(
        run_id: impl Into<String>,
        script_id: impl Into<String>,
        required_locks: Vec<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            script_id: script_id.into(),
            required_locks,
        }
    }

    /// A request whose locks are derived from the manifest's permissions.
    pub fn for_manifest(run_id: impl Into<String>, manifest: &Manifest) -> Self {
        Self::new(run_id, manifest.id.clone(), manifest.required_locks())
    }
}

/// Point-in-time view of a run queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queued run ids, head first.
    pub queued: Vec<String>,
    /// Running run ids, sorted.
    pub running: Vec<String>,
    /// Lock name → owning run id.
    pub locks: BTreeMap<String, String>,
}
