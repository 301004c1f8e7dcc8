//! Batch driver: runs many scripts through one engine under a `RunQueue`.

use std::{path::PathBuf, sync::Arc};

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use scriptgate_contracts::{
    envelope::ExecutionEnvelope,
    error::{ScriptGateError, ScriptGateResult},
    schedule::RunRequest,
};
use scriptgate_core::Engine;

use crate::queue::RunQueue;

/// One script run to schedule.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub request: RunRequest,
    pub script_dir: PathBuf,
    pub inputs: Value,
}

impl BatchJob {
    /// A job whose locks come from the script's manifest.
    ///
    /// A script whose manifest does not validate gets no locks; its run will
    /// fail on its own and report the problem in its envelope.
    pub fn for_script(
        engine: &Engine,
        run_id: impl Into<String>,
        script_dir: impl Into<PathBuf>,
        inputs: Value,
    ) -> Self {
        let run_id = run_id.into();
        let script_dir = script_dir.into();
        let request = match engine.validate_script(&script_dir) {
            Ok(manifest) => RunRequest::for_manifest(run_id, &manifest),
            Err(e) => {
                debug!(run_id = %run_id, error = %e, "scheduling unvalidated script without locks");
                let script_id = script_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                RunRequest::new(run_id, script_id, Vec::new())
            }
        };
        Self { request, script_dir, inputs }
    }
}

/// A finished job.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The scheduler's run id (the envelope carries the engine's own).
    pub run_id: String,
    pub envelope: ExecutionEnvelope,
}

/// Drives a `RunQueue` and a shared `Engine` to completion.
pub struct BatchDriver {
    engine: Arc<Engine>,
    max_concurrent_runs: usize,
}

impl BatchDriver {
    pub fn new(engine: Arc<Engine>, max_concurrent_runs: usize) -> Self {
        Self { engine, max_concurrent_runs }
    }

    /// Run every job and return the outcomes in completion order.
    ///
    /// # Errors
    ///
    /// `DuplicateRun` if two jobs share a run id (nothing is run), or
    /// `ScriptRaised` if a driver task itself dies.
    pub async fn run_all(&self, jobs: Vec<BatchJob>) -> ScriptGateResult<Vec<BatchOutcome>> {
        let mut queue = RunQueue::new(self.max_concurrent_runs);
        let mut pending = std::collections::HashMap::with_capacity(jobs.len());
        for job in jobs {
            queue.enqueue(job.request.clone())?;
            pending.insert(job.request.run_id.clone(), job);
        }
        info!(jobs = pending.len(), max_concurrent_runs = queue.max_concurrent_runs(), "batch starting");

        let mut tasks: JoinSet<(String, ExecutionEnvelope)> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(pending.len());

        loop {
            for request in queue.tick() {
                let Some(job) = pending.remove(&request.run_id) else {
                    continue;
                };
                let engine = Arc::clone(&self.engine);
                tasks.spawn(async move {
                    let envelope = engine.run(&job.script_dir, job.inputs).await;
                    (job.request.run_id, envelope)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (run_id, envelope) = joined.map_err(|e| ScriptGateError::ScriptRaised {
                message: format!("batch task failed: {e}"),
            })?;
            queue.complete(&run_id);
            debug!(run_id = %run_id, ok = envelope.ok, "batch run finished");
            outcomes.push(BatchOutcome { run_id, envelope });
        }

        if !queue.is_idle() {
            warn!(snapshot = ?queue.snapshot(), "batch ended with runs still queued");
        }
        info!(completed = outcomes.len(), "batch finished");
        Ok(outcomes)
    }
}
