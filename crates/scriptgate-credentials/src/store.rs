//! OS secret stores.
//!
//! A secret-store ref has the form `[keychain:]service[/account]`. On macOS it
//! is looked up in the login keychain with `security find-generic-password`;
//! on Linux with `secret-tool lookup` (libsecret). Other platforms have no
//! store and every lookup reports [`StoreError::Unavailable`].

use std::{collections::HashMap, process::Command};

use thiserror::Error;
use tracing::debug;

const KEYCHAIN_PREFIX: &str = "keychain:";

/// A parsed secret-store reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    pub service: String,
    pub account: Option<String>,
}

impl SecretRef {
    /// Parse `[keychain:]service[/account]`. Returns `None` for an empty service.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix(KEYCHAIN_PREFIX).unwrap_or(trimmed);
        let (service, account) = match body.split_once('/') {
            Some((service, account)) => (service.trim(), Some(account.trim())),
            None => (body.trim(), None),
        };
        if service.is_empty() {
            return None;
        }
        Some(Self {
            service: service.to_string(),
            account: account.filter(|a| !a.is_empty()).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("secret store lookup failed: {0}")]
    Lookup(String),
}

/// A place secrets can be looked up by service and account.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the store has no such entry.
    fn lookup(&self, secret: &SecretRef) -> Result<Option<String>, StoreError>;
}

// ── Platform store ───────────────────────────────────────────────────────────

/// The secret store of the host OS, driven through its command-line tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSecretStore;

impl PlatformSecretStore {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "macos")]
    fn command(secret: &SecretRef) -> Option<Command> {
        let mut cmd = Command::new("security");
        cmd.args(["find-generic-password", "-s", secret.service.as_str()]);
        if let Some(account) = &secret.account {
            cmd.args(["-a", account.as_str()]);
        }
        cmd.arg("-w");
        Some(cmd)
    }

    #[cfg(target_os = "linux")]
    fn command(secret: &SecretRef) -> Option<Command> {
        let mut cmd = Command::new("secret-tool");
        cmd.args(["lookup", "service", secret.service.as_str()]);
        if let Some(account) = &secret.account {
            cmd.args(["account", account.as_str()]);
        }
        Some(cmd)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn command(_secret: &SecretRef) -> Option<Command> {
        None
    }
}

impl SecretStore for PlatformSecretStore {
    fn lookup(&self, secret: &SecretRef) -> Result<Option<String>, StoreError> {
        let Some(mut cmd) = Self::command(secret) else {
            return Err(StoreError::Unavailable("no secret store on this platform".to_string()));
        };

        let output = cmd.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Lookup(e.to_string()),
        })?;

        // Both tools exit non-zero when the entry does not exist.
        if !output.status.success() {
            debug!(service = %secret.service, status = ?output.status.code(), "secret store has no entry");
            return Ok(None);
        }

        let value = String::from_utf8(output.stdout)
            .map_err(|_| StoreError::Lookup("secret is not valid UTF-8".to_string()))?;
        let value = value.trim_end_matches(['\r', '\n']);
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// A fixed table of secrets, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: HashMap<SecretRef, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, service: &str, account: Option<&str>, value: impl Into<String>) {
        let key = SecretRef {
            service: service.to_string(),
            account: account.map(str::to_string),
        };
        self.entries.insert(key, value.into());
    }
}

impl SecretStore for MemorySecretStore {
    fn lookup(&self, secret: &SecretRef) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(secret).cloned())
    }
}
