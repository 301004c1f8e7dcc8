//! Entrypoint loaders.
//!
//! Two ways of turning a manifest entrypoint into a `Runnable`:
//!
//! - [`ScriptRegistry`]: script bodies compiled into the host and registered
//!   by script id, with an optional fallback loader.
//! - [`ProcessLoader`]: the entrypoint file is an executable. It receives
//!   `{"context": …, "inputs": …}` on stdin and writes its JSON result to
//!   stdout; a non-zero exit status is a script failure.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

use scriptgate_contracts::{
    context::ScriptContext,
    error::{ScriptGateError, ScriptGateResult},
    manifest::Manifest,
};

use crate::traits::{EntrypointLoader, Runnable, ScriptFailure};

/// How much of a failing child's stderr is carried into the error message.
const STDERR_TAIL_BYTES: usize = 2048;

// ── Registry ─────────────────────────────────────────────────────────────────

/// Script bodies registered by script id.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Arc<dyn Runnable>>,
    fallback: Option<Box<dyn EntrypointLoader>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `runnable` for manifests whose `id` is `script_id`.
    ///
    /// Registering the same id twice replaces the previous body.
    pub fn register(&mut self, script_id: impl Into<String>, runnable: Arc<dyn Runnable>) {
        self.scripts.insert(script_id.into(), runnable);
    }

    /// Delegate ids with no registered body to `loader`.
    pub fn with_fallback(mut self, loader: Box<dyn EntrypointLoader>) -> Self {
        self.fallback = Some(loader);
        self
    }

    pub fn is_registered(&self, script_id: &str) -> bool {
        self.scripts.contains_key(script_id)
    }
}

impl EntrypointLoader for ScriptRegistry {
    fn load(&self, manifest: &Manifest, entrypoint: &Path) -> ScriptGateResult<Arc<dyn Runnable>> {
        if let Some(runnable) = self.scripts.get(&manifest.id) {
            debug!(script_id = %manifest.id, "entrypoint resolved from registry");
            return Ok(Arc::clone(runnable));
        }
        match &self.fallback {
            Some(loader) => loader.load(manifest, entrypoint),
            None => Err(ScriptGateError::EntrypointLoad {
                reason: format!("no runnable registered for script '{}'", manifest.id),
            }),
        }
    }
}

// ── Child process ────────────────────────────────────────────────────────────

/// Loads entrypoints as executables run in a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessLoader;

impl ProcessLoader {
    pub fn new() -> Self {
        Self
    }
}

impl EntrypointLoader for ProcessLoader {
    fn load(&self, manifest: &Manifest, entrypoint: &Path) -> ScriptGateResult<Arc<dyn Runnable>> {
        ensure_executable(entrypoint)?;
        debug!(script_id = %manifest.id, entrypoint = %entrypoint.display(), "entrypoint loaded as process");
        Ok(Arc::new(ProcessRunnable { program: entrypoint.to_path_buf() }))
    }
}

#[cfg(unix)]
fn ensure_executable(entrypoint: &Path) -> ScriptGateResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(entrypoint).map_err(|e| ScriptGateError::EntrypointLoad {
        reason: format!("cannot stat '{}': {e}", entrypoint.display()),
    })?;
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(ScriptGateError::EntrypointLoad {
            reason: format!("'{}' is not executable", entrypoint.display()),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_entrypoint: &Path) -> ScriptGateResult<()> {
    Ok(())
}

/// One executable entrypoint.
struct ProcessRunnable {
    program: PathBuf,
}

#[async_trait]
impl Runnable for ProcessRunnable {
    async fn run(&self, context: ScriptContext, inputs: Value) -> Result<Value, ScriptFailure> {
        let payload = serde_json::to_vec(&json!({ "context": &context, "inputs": inputs }))?;

        // Killed if this future is dropped. An engine timeout detaches the
        // task instead, so a hung child keeps running until it exits.
        let mut child = Command::new(&self.program)
            .current_dir(&context.script_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Fed while stdout and stderr drain, so a child that writes before
        // reading cannot fill both pipes.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A script that ignores its stdin may close it early.
                let _ = stdin.write_all(&payload).await;
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
            return Err(ScriptFailure::new(format!(
                "entrypoint exited with {code}: {}",
                tail(stderr.trim(), STDERR_TAIL_BYTES)
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ScriptFailure::new(format!("entrypoint wrote invalid JSON to stdout: {e}"))
        })
    }
}

/// The last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

// ── Tests ────────────────────────────────────────────────────────────────────
