use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use acme_lib::{
    Directory, DirectoryUrl, Error as AcmeError, create_p256_key, create_p384_key, create_rsa_key,
    order::NewOrder,
    persist::{Persist, PersistKey, PersistKind},
};
use chrono::Utc;
use log::{debug, info, warn};
use zeroize::Zeroizing;

use super::{
    account::{Account, Registration},
    dns::ChallengeProvider,
    issuer::{AcmeClient, ClientFactory, IssuerError, directory_url},
};
use crate::{
    core::types::{CertificateBundle, KeyType},
    storage::certificate::bundle_from_chain,
};

const VALIDATION_POLL_MS: u64 = 2000;
const FINALIZE_POLL_MS: u64 = 5000;
const MAX_ORDER_REFRESHES: u32 = 10;

/// In-memory persistence for acme-lib that avoids disk I/O and lets us seed the ACME account key.
#[derive(Clone, Default)]
pub struct EphemeralPersist {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl EphemeralPersist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_account_key(&self, realm: &str, pem: &[u8]) -> Result<(), IssuerError> {
        let key = PersistKey::new(realm, PersistKind::AccountPrivateKey, "acme_account");
        self.put(&key, pem).map_err(operation)
    }
}

impl Persist for EphemeralPersist {
    fn put(&self, key: &PersistKey, value: &[u8]) -> acme_lib::Result<()> {
        let mut lock = self
            .inner
            .lock()
            .map_err(|e| AcmeError::Other(e.to_string()))?;
        lock.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &PersistKey) -> acme_lib::Result<Option<Vec<u8>>> {
        let lock = self
            .inner
            .lock()
            .map_err(|e| AcmeError::Other(e.to_string()))?;
        Ok(lock.get(&key.to_string()).cloned())
    }
}

fn operation(err: AcmeError) -> IssuerError {
    IssuerError::Operation(err.to_string())
}

/// Generates the private key for the issued certificate.
pub fn generate_private_key(key_type: KeyType) -> Result<Zeroizing<String>, IssuerError> {
    let key = match key_type {
        KeyType::Rsa2048 => create_rsa_key(2048),
        KeyType::Rsa4096 => create_rsa_key(4096),
        KeyType::P256 => create_p256_key(),
        KeyType::P384 => create_p384_key(),
    };

    let key_pem = key
        .private_key_to_pem_pkcs8()
        .map_err(|e| IssuerError::Operation(format!("failed to serialize private key: {e}")))?;

    String::from_utf8(key_pem)
        .map(Zeroizing::new)
        .map_err(|_| IssuerError::Operation("certificate key PEM contained invalid UTF-8".into()))
}

/// Creates [`AcmeLibClient`]s for Let's Encrypt.
#[derive(Debug, Clone, Default)]
pub struct AcmeLibClientFactory {
    key_type: KeyType,
    directory_override: Option<String>,
}

impl AcmeLibClientFactory {
    pub fn new(key_type: KeyType) -> Self {
        Self {
            key_type,
            directory_override: None,
        }
    }

    /// Points every client at another ACME directory (e.g. a local Pebble).
    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_override = Some(url.into());
        self
    }
}

impl ClientFactory for AcmeLibClientFactory {
    fn create(&self, account: &Account, staging: bool) -> Result<Box<dyn AcmeClient>, IssuerError> {
        let directory_url = self
            .directory_override
            .clone()
            .unwrap_or_else(|| directory_url(staging).to_string());

        let persist = EphemeralPersist::new();
        persist.seed_account_key(&account.email, account.encoded_private_key().as_bytes())?;

        let directory = Directory::from_url(persist, DirectoryUrl::Other(&directory_url))
            .map_err(|e| IssuerError::Unavailable(format!("{directory_url}: {e}")))?;
        debug!("[acme] connected to directory {directory_url}");

        Ok(Box::new(AcmeLibClient {
            directory,
            directory_url,
            email: account.email.clone(),
            contact: account.contact(),
            key_type: self.key_type,
            provider: None,
            account: None,
        }))
    }
}

/// acme-lib backed client solving DNS-01 challenges through a
/// [`ChallengeProvider`].
pub struct AcmeLibClient {
    directory: Directory<EphemeralPersist>,
    directory_url: String,
    email: String,
    contact: String,
    key_type: KeyType,
    provider: Option<Arc<dyn ChallengeProvider>>,
    account: Option<acme_lib::Account<EphemeralPersist>>,
}

impl AcmeLibClient {
    fn authorize(
        &self,
        order: &NewOrder<EphemeralPersist>,
        provider: &dyn ChallengeProvider,
    ) -> Result<(), IssuerError> {
        let auths = order.authorizations().map_err(operation)?;
        let mut presented: Vec<(String, String)> = Vec::new();

        let mut result = Ok(());
        for auth in &auths {
            if !auth.need_challenge() {
                debug!("[{}] acme: authorization already valid", auth.domain_name());
                continue;
            }
            let challenge = auth.dns_challenge();
            let proof = challenge.dns_proof();
            let domain = auth.domain_name().to_string();

            if let Err(err) = provider.present(&domain, &proof) {
                result = Err(IssuerError::from(err));
                break;
            }
            presented.push((domain.clone(), proof));
            info!("[{domain}] acme: challenge record present, requesting validation");

            if let Err(err) = challenge.validate(VALIDATION_POLL_MS) {
                result = Err(operation(err));
                break;
            }
        }

        for (domain, proof) in presented {
            if let Err(err) = provider.cleanup(&domain, &proof) {
                warn!("[{domain}] acme: challenge cleanup failed: {err}");
            }
        }
        result
    }
}

impl AcmeClient for AcmeLibClient {
    fn set_challenge_provider(&mut self, provider: Arc<dyn ChallengeProvider>) -> Result<(), IssuerError> {
        self.provider = Some(provider);
        Ok(())
    }

    fn register(&mut self) -> Result<Registration, IssuerError> {
        let account = self
            .directory
            .account_with_realm(&self.email, Some(vec![self.contact.clone()]))
            .map_err(operation)?;
        self.account = Some(account);
        info!("[acme] account registered for {}", self.email);

        Ok(Registration {
            email: self.email.clone(),
            directory_url: self.directory_url.clone(),
            registered_at: Utc::now(),
        })
    }

    fn obtain(&mut self, domains: &[String]) -> Result<CertificateBundle, IssuerError> {
        let account = self.account.as_ref().ok_or(IssuerError::NotRegistered)?;
        let provider = self.provider.clone().ok_or(IssuerError::MissingChallengeProvider)?;
        let (primary, alt_names) = domains
            .split_first()
            .ok_or_else(|| IssuerError::InvalidConfig("at least one domain is required".into()))?;
        let alt_names: Vec<&str> = alt_names.iter().map(String::as_str).collect();

        let mut order = account.new_order(primary, &alt_names).map_err(operation)?;
        self.authorize(&order, provider.as_ref())?;

        let mut refreshes = 0;
        let csr_order = loop {
            if let Some(csr) = order.confirm_validations() {
                break csr;
            }
            refreshes += 1;
            if refreshes > MAX_ORDER_REFRESHES {
                return Err(IssuerError::Operation(format!(
                    "order for {primary} was not validated after {MAX_ORDER_REFRESHES} refreshes"
                )));
            }
            thread::sleep(Duration::from_millis(VALIDATION_POLL_MS));
            order.refresh().map_err(operation)?;
        };

        let private_key_pem = generate_private_key(self.key_type)?;
        debug!("[{primary}] acme: finalizing order with {} key", self.key_type.as_str());
        let cert_order = csr_order
            .finalize(&private_key_pem, FINALIZE_POLL_MS)
            .map_err(operation)?;
        let certificate = cert_order.download_and_save_cert().map_err(operation)?;
        info!("[{primary}] acme: certificate downloaded");

        bundle_from_chain(primary, certificate.certificate(), certificate.private_key())
            .map_err(|err| IssuerError::Operation(format!("downloaded certificate is unusable: {err}")))
    }
}
