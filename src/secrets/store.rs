use thiserror::Error;

/// Errors produced by secret storage backends.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("secret store error: {0}")]
    Store(String),
}

/// Durable key -> string persistence for account keys.
///
/// Writes are whole-value overwrites with no conflict detection. Implementations
/// are shared across per-domain tasks and must be safe for concurrent use.
pub trait SecretStore: Send + Sync {
    fn store(&self, key: &str, value: &str) -> Result<(), SecretStoreError>;
    fn retrieve(&self, key: &str) -> Result<String, SecretStoreError>;
}
