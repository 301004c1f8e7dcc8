//! The credential resolution chain.
//!
//! Each `{logical_name: ref}` pair is tried in order:
//!
//! 1. the environment variable `<env_prefix><REF>`
//! 2. the secret store, if enabled and the ref parses as a store ref
//!
//! The first non-empty value wins. Refs with no value anywhere land in
//! `unresolved`; resolution as a whole never fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scriptgate_contracts::context::CredentialResolution;
use scriptgate_core::traits::CredentialResolver;

use crate::store::{PlatformSecretStore, SecretRef, SecretStore};

pub const DEFAULT_ENV_PREFIX: &str = "SCRIPTGATE_CRED_";

/// Resolver settings, usually the `[credentials]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub env_prefix: String,
    /// Consult the OS secret store after the environment.
    pub use_secret_store: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { env_prefix: DEFAULT_ENV_PREFIX.to_string(), use_secret_store: true }
    }
}

/// `prefix` followed by `reference` upper-cased, with every character that is
/// not ASCII alphanumeric replaced by `_`.
///
/// `env_var_name("SCRIPTGATE_CRED_", "united/login")` is
/// `SCRIPTGATE_CRED_UNITED_LOGIN`.
pub fn env_var_name(prefix: &str, reference: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + reference.len());
    name.push_str(prefix);
    name.extend(reference.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    name
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment first, then the secret store.
pub struct ChainedResolver {
    config: ResolverConfig,
    env: EnvLookup,
    store: Option<Box<dyn SecretStore>>,
}

impl ChainedResolver {
    /// A resolver over the process environment and, if enabled, the platform
    /// secret store.
    pub fn from_env(config: ResolverConfig) -> Self {
        let store: Option<Box<dyn SecretStore>> =
            config.use_secret_store.then(|| Box::new(PlatformSecretStore::new()) as Box<dyn SecretStore>);
        Self {
            config,
            env: Box::new(|key| std::env::var(key).ok()),
            store,
        }
    }

    /// A resolver over an arbitrary environment lookup and no secret store.
    pub fn with_env_lookup(
        config: ResolverConfig,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self { config, env: Box::new(env), store: None }
    }

    /// Replace the secret store. Ignored unless `use_secret_store` is set.
    pub fn with_store(mut self, store: Box<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn lookup_one(&self, name: &str, reference: &str) -> Option<String> {
        let var = env_var_name(&self.config.env_prefix, reference);
        if let Some(value) = (self.env)(&var).filter(|v| !v.is_empty()) {
            debug!(credential = %name, source = "env", "credential resolved");
            return Some(value);
        }

        if !self.config.use_secret_store {
            return None;
        }
        let store = self.store.as_ref()?;
        let secret = SecretRef::parse(reference)?;
        match store.lookup(&secret) {
            Ok(Some(value)) if !value.is_empty() => {
                debug!(credential = %name, source = "secret_store", "credential resolved");
                Some(value)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(credential = %name, error = %e, "secret store lookup failed");
                None
            }
        }
    }
}

impl CredentialResolver for ChainedResolver {
    fn resolve(&self, refs: &BTreeMap<String, String>) -> CredentialResolution {
        let mut resolution = CredentialResolution::default();
        for (name, reference) in refs {
            let value = if reference.trim().is_empty() {
                None
            } else {
                self.lookup_one(name, reference)
            };
            match value {
                Some(value) => {
                    resolution.resolved.insert(name.clone(), value);
                }
                None => {
                    debug!(credential = %name, "credential unresolved");
                    resolution.unresolved.insert(name.clone(), reference.clone());
                }
            }
        }
        resolution
    }
}
