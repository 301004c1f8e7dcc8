//! FIFO run queue with a concurrency cap and named-lock admission.
//!
//! `tick` scans the queue from the head and admits every request whose locks
//! are all free, until the cap is reached. A blocked request does not stop
//! later requests from being admitted; it keeps its place ahead of them for
//! the next tick.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use scriptgate_contracts::{
    error::{ScriptGateError, ScriptGateResult},
    schedule::{QueueSnapshot, RunRequest},
};

use crate::lock::LockManager;

#[derive(Debug)]
pub struct RunQueue {
    max_concurrent_runs: usize,
    queued: VecDeque<RunRequest>,
    running: HashMap<String, RunRequest>,
    locks: LockManager,
}

impl RunQueue {
    /// A queue admitting at most `max_concurrent_runs` runs at once (at least 1).
    pub fn new(max_concurrent_runs: usize) -> Self {
        let cap = if max_concurrent_runs < 1 {
            warn!(requested = max_concurrent_runs, "max_concurrent_runs below 1, using 1");
            1
        } else {
            max_concurrent_runs
        };
        Self {
            max_concurrent_runs: cap,
            queued: VecDeque::new(),
            running: HashMap::new(),
            locks: LockManager::new(),
        }
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }

    /// Append `request` to the tail of the queue.
    ///
    /// # Errors
    ///
    /// `DuplicateRun` when a run with the same id is queued or running.
    pub fn enqueue(&mut self, request: RunRequest) -> ScriptGateResult<()> {
        let duplicate = self.running.contains_key(&request.run_id)
            || self.queued.iter().any(|queued| queued.run_id == request.run_id);
        if duplicate {
            return Err(ScriptGateError::DuplicateRun { run_id: request.run_id });
        }
        debug!(run_id = %request.run_id, script_id = %request.script_id, "run enqueued");
        self.queued.push_back(request);
        Ok(())
    }

    /// Admit as many queued requests as capacity and locks allow.
    pub fn tick(&mut self) -> Vec<RunRequest> {
        let mut admitted = Vec::new();
        let mut blocked = VecDeque::new();

        while self.running.len() < self.max_concurrent_runs {
            let Some(request) = self.queued.pop_front() else {
                break;
            };
            if self.locks.try_acquire(&request.run_id, &request.required_locks) {
                debug!(run_id = %request.run_id, "run admitted");
                self.running.insert(request.run_id.clone(), request.clone());
                admitted.push(request);
            } else {
                blocked.push_back(request);
            }
        }

        blocked.append(&mut self.queued);
        self.queued = blocked;
        admitted
    }

    /// Mark `run_id` finished and release its locks.
    ///
    /// Returns false if the run was not running.
    pub fn complete(&mut self, run_id: &str) -> bool {
        let was_running = self.running.remove(run_id).is_some();
        self.locks.release(run_id);
        if was_running {
            debug!(run_id, "run completed");
        }
        was_running
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let mut running: Vec<String> = self.running.keys().cloned().collect();
        running.sort();
        QueueSnapshot {
            queued: self.queued.iter().map(|r| r.run_id.clone()).collect(),
            running,
            locks: self.locks.held(),
        }
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.running.is_empty()
    }
}
