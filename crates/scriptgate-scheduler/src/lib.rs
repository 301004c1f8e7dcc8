//! # scriptgate-scheduler
//!
//! Admission control for concurrent script runs.
//!
//! Scripts that drive a shared external resource (the default browser
//! profile, a VPN session, a single-seat account) declare it as a named lock.
//! [`RunQueue`] admits queued runs in FIFO order while their locks are free
//! and a concurrency cap is not reached; [`BatchDriver`] feeds admitted runs
//! to a shared [`Engine`](scriptgate_core::Engine) on a tokio `JoinSet`.
//!
//! ```rust,ignore
//! let driver = BatchDriver::new(Arc::new(engine), 2);
//! let jobs = dirs.iter().enumerate()
//!     .map(|(i, dir)| BatchJob::for_script(&engine, format!("run-{i}"), dir, json!({})))
//!     .collect();
//! for outcome in driver.run_all(jobs).await? {
//!     println!("{} ok={}", outcome.run_id, outcome.envelope.ok);
//! }
//! ```

pub mod driver;
pub mod lock;
pub mod queue;

pub use driver::{BatchDriver, BatchJob, BatchOutcome};
pub use lock::LockManager;
pub use queue::RunQueue;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use scriptgate_contracts::{
        context::{CredentialResolution, ScriptContext},
        error::ScriptGateError,
        gate::GateDecision,
        manifest::{Manifest, BROWSER_PROFILE_LOCK},
        validation::ValidationReport,
    };
    use scriptgate_core::{
        loader::ScriptRegistry,
        traits::{CredentialResolver, GateEvaluator, Runnable, SchemaValidator, ScriptFailure},
        Engine, EngineConfig,
    };

    use crate::{BatchDriver, BatchJob};

    // ── Mocks ─────────────────────────────────────────────────────────────────

    struct OpenGate;

    impl GateEvaluator for OpenGate {
        fn is_enabled(&self) -> bool {
            false
        }

        fn evaluate(&self, _manifest: &Manifest, _inputs: &Value, _now: i64) -> GateDecision {
            GateDecision::allow(false, false, false)
        }
    }

    struct PassValidator;

    impl SchemaValidator for PassValidator {
        fn check_schema(&self, _schema: &Value) -> Result<(), String> {
            Ok(())
        }

        fn validate(&self, _instance: &Value, _schema: &Value) -> ValidationReport {
            ValidationReport::pass()
        }
    }

    struct NoCredentials;

    impl CredentialResolver for NoCredentials {
        fn resolve(&self, refs: &BTreeMap<String, String>) -> CredentialResolution {
            CredentialResolution { resolved: BTreeMap::new(), unresolved: refs.clone() }
        }
    }

    /// Sleeps briefly and records the peak number of concurrent runs.
    #[derive(Default)]
    struct Tracker {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Runnable for Tracker {
        async fn run(&self, _context: ScriptContext, _inputs: Value) -> Result<Value, ScriptFailure> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({ "summary": "done" }))
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_script(dir: &Path, id: &str, browser: bool) {
        std::fs::create_dir_all(dir).unwrap();
        let manifest = json!({
            "id": id,
            "version": "1.0.0",
            "entrypoint": "main",
            "inputs_schema": "inputs.schema.json",
            "outputs_schema": "outputs.schema.json",
            "permissions": { "browser": browser }
        });
        std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
        std::fs::write(dir.join("main"), "").unwrap();
        std::fs::write(dir.join("inputs.schema.json"), "{}").unwrap();
        std::fs::write(dir.join("outputs.schema.json"), "{}").unwrap();
    }

    fn engine(tracker: Arc<Tracker>) -> Arc<Engine> {
        let mut registry = ScriptRegistry::new();
        registry.register("browser-script", tracker.clone());
        registry.register("api-script", tracker);
        Arc::new(Engine::new(
            EngineConfig::default(),
            Box::new(OpenGate),
            Box::new(PassValidator),
            Box::new(registry),
            Arc::new(NoCredentials),
        ))
    }

    // ── Driver ────────────────────────────────────────────────────────────────

    #[test]
    fn test_job_locks_come_from_manifest() {
        let root = tempfile::tempdir().unwrap();
        let browser = root.path().join("browser");
        write_script(&browser, "browser-script", true);
        let engine = engine(Arc::new(Tracker::default()));

        let job = BatchJob::for_script(&engine, "run-1", &browser, json!({}));
        assert_eq!(job.request.script_id, "browser-script");
        assert_eq!(job.request.required_locks, vec![BROWSER_PROFILE_LOCK.to_string()]);

        let missing = BatchJob::for_script(&engine, "run-2", root.path().join("nope"), json!({}));
        assert!(missing.request.required_locks.is_empty());
    }

    #[tokio::test]
    async fn test_browser_runs_never_overlap() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("browser");
        write_script(&dir, "browser-script", true);

        let tracker = Arc::new(Tracker::default());
        let engine = engine(tracker.clone());
        let jobs = (0..3)
            .map(|i| BatchJob::for_script(&engine, format!("run-{i}"), &dir, json!({})))
            .collect();

        let outcomes = BatchDriver::new(engine, 3).run_all(jobs).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.envelope.ok));
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lock_free_runs_respect_concurrency_cap() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("api");
        write_script(&dir, "api-script", false);

        let tracker = Arc::new(Tracker::default());
        let engine = engine(tracker.clone());
        let jobs = (0..4)
            .map(|i| BatchJob::for_script(&engine, format!("run-{i}"), &dir, json!({})))
            .collect();

        let outcomes = BatchDriver::new(engine, 2).run_all(jobs).await.unwrap();

        assert_eq!(outcomes.len(), 4);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);
        let mut ids: Vec<&str> = outcomes.iter().map(|o| o.run_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["run-0", "run-1", "run-2", "run-3"]);
    }

    #[tokio::test]
    async fn test_duplicate_run_ids_abort_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("api");
        write_script(&dir, "api-script", false);

        let tracker = Arc::new(Tracker::default());
        let engine = engine(tracker.clone());
        let jobs = vec![
            BatchJob::for_script(&engine, "same", &dir, json!({})),
            BatchJob::for_script(&engine, "same", &dir, json!({})),
        ];

        let result = BatchDriver::new(engine, 2).run_all(jobs).await;

        assert!(matches!(result, Err(ScriptGateError::DuplicateRun { .. })));
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 0);
    }
}
