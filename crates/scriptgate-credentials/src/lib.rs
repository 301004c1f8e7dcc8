//! # scriptgate-credentials
//!
//! Resolves the `credential_refs` of a run into secret values.
//!
//! [`ChainedResolver`] implements the
//! [`CredentialResolver`](scriptgate_core::traits::CredentialResolver) trait:
//! environment variables first, then the OS secret store. Values are handed
//! to the script through its context and never logged.

pub mod resolver;
pub mod store;

pub use resolver::{env_var_name, ChainedResolver, ResolverConfig};
pub use store::{MemorySecretStore, PlatformSecretStore, SecretRef, SecretStore, StoreError};
