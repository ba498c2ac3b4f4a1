use std::sync::Arc;

use thiserror::Error;

use super::{
    account::{Account, Registration},
    dns::{ChallengeError, ChallengeProvider},
};
use crate::core::types::CertificateBundle;

pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

pub fn directory_url(staging: bool) -> &'static str {
    if staging {
        LETS_ENCRYPT_STAGING
    } else {
        LETS_ENCRYPT_PRODUCTION
    }
}

#[derive(Error, Debug)]
pub enum IssuerError {
    #[error("issuer unavailable: {0}")]
    Unavailable(String),
    #[error("issuer configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("account is not registered")]
    NotRegistered,
    #[error("no challenge provider bound to the client")]
    MissingChallengeProvider,
    #[error("challenge failed: {0}")]
    Challenge(#[from] ChallengeError),
    #[error("issuer operation failed: {0}")]
    Operation(String),
}

/// CA-protocol client bound to one account.
///
/// A client lives for a single orchestration run and is only used from the
/// thread that created it.
pub trait AcmeClient {
    /// Binds the DNS-01 provider used to prove control of each domain.
    fn set_challenge_provider(&mut self, provider: Arc<dyn ChallengeProvider>) -> Result<(), IssuerError>;

    /// Registers the account with the CA, agreeing to the terms of service.
    fn register(&mut self) -> Result<Registration, IssuerError>;

    /// Orders, validates and downloads a certificate covering `domains`.
    fn obtain(&mut self, domains: &[String]) -> Result<CertificateBundle, IssuerError>;
}

/// Builds a fresh client per run so tasks never share ACME state.
pub trait ClientFactory: Send + Sync {
    fn create(&self, account: &Account, staging: bool) -> Result<Box<dyn AcmeClient>, IssuerError>;
}
