//! Execution context handed to script entrypoints, and credential results.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Everything a script body receives besides its inputs.
///
/// `credentials` carries secret values. The `Debug` impl prints key names only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptContext {
    pub script_id: String,
    pub script_version: String,
    pub script_dir: PathBuf,
    /// Logical credential name → resolved secret value.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    /// Logical credential name → ref that could not be resolved.
    #[serde(default)]
    pub unresolved_credential_refs: BTreeMap<String, String>,
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("script_id", &self.script_id)
            .field("script_version", &self.script_version)
            .field("script_dir", &self.script_dir)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .field("unresolved_credential_refs", &self.unresolved_credential_refs)
            .finish()
    }
}

/// The outcome of resolving a batch of credential refs.
///
/// Resolution never fails as a whole: each ref lands in exactly one map.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialResolution {
    /// Logical name → secret value.
    pub resolved: BTreeMap<String, String>,
    /// Logical name → the ref that had no value anywhere in the chain.
    pub unresolved: BTreeMap<String, String>,
}

impl fmt::Debug for CredentialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolution")
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

/// Credential bookkeeping reported in the envelope. Never carries secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// Logical name → ref, for every ref the caller asked for.
    pub requested_refs: BTreeMap<String, String>,
    /// Logical names that resolved to a value.
    pub resolved_keys: Vec<String>,
    /// Logical name → ref for the refs left unresolved.
    pub unresolved_refs: BTreeMap<String, String>,
}

impl CredentialStatus {
    /// Status for refs that were requested but never resolved (e.g. gate blocked).
    pub fn requested_only(requested: BTreeMap<String, String>) -> Self {
        Self { requested_refs: requested, ..Self::default() }
    }

    /// Build the envelope status from a resolution result, dropping the values.
    pub fn from_resolution(
        requested: BTreeMap<String, String>,
        resolution: &CredentialResolution,
    ) -> Self {
        Self {
            requested_refs: requested,
            resolved_keys: resolution.resolved.keys().cloned().collect(),
            unresolved_refs: resolution.unresolved.clone(),
        }
    }
}
