pub mod file_store;
pub mod memory_store;
pub mod secrets_manager_store;
pub mod ssm_parameter_store;
pub mod store;

use std::{path::Path, sync::Arc};

use anyhow::Result;

pub use file_store::FileSecretStore;
pub use memory_store::MemorySecretStore;
pub use secrets_manager_store::SecretsManagerStore;
pub use ssm_parameter_store::SsmParameterStore;
pub use store::{SecretStore, SecretStoreError};

use crate::aws::AwsContext;

/// Supported secret store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SecretStoreKind {
    /// Local directory, one `<domain>.pem` file per key
    #[default]
    File,
    /// AWS Systems Manager Parameter Store (SecureString)
    SsmParameter,
    /// AWS Secrets Manager
    SecretManager,
    /// In-memory only; keys are discarded at exit
    Memory,
}

impl SecretStoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretStoreKind::File => "file",
            SecretStoreKind::SsmParameter => "ssm-parameter",
            SecretStoreKind::SecretManager => "secret-manager",
            SecretStoreKind::Memory => "memory",
        }
    }

    /// Unknown tags fall back to the file store, as the serverless payload
    /// has always done.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "ssm-parameter" => SecretStoreKind::SsmParameter,
            "secret-manager" => SecretStoreKind::SecretManager,
            "memory" => SecretStoreKind::Memory,
            _ => SecretStoreKind::File,
        }
    }
}

/// Resolve the configured backend into a single store value.
///
/// `location` is the directory for the file store and the name prefix for the
/// remote stores.
pub fn create_secret_store(
    kind: SecretStoreKind,
    location: &Path,
    aws: &AwsContext,
) -> Result<Arc<dyn SecretStore>> {
    let prefix = location.to_string_lossy().to_string();
    let store: Arc<dyn SecretStore> = match kind {
        SecretStoreKind::File => {
            log::info!("[secrets] using file store in '{}'", location.display());
            Arc::new(FileSecretStore::new(location)?)
        }
        SecretStoreKind::SsmParameter => {
            log::info!("[secrets] using SSM parameter store with prefix '{prefix}'");
            Arc::new(SsmParameterStore::new(aws, prefix))
        }
        SecretStoreKind::SecretManager => {
            log::info!("[secrets] using Secrets Manager with prefix '{prefix}'");
            Arc::new(SecretsManagerStore::new(aws, prefix))
        }
        SecretStoreKind::Memory => {
            log::warn!("[secrets] using in-memory store; account keys will not be persisted");
            Arc::new(MemorySecretStore::new())
        }
    };
    Ok(store)
}
