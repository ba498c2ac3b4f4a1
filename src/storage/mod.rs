//! Certificate repositories.
//!
//! A repository is looked up by domain through the subject alternative names
//! of the certificates it holds, and new material is imported so that a domain
//! keeps exactly one entry: when a matching certificate already exists its
//! identifier is reused and the entry is replaced in place.

pub mod acm;
pub mod certificate;
pub mod inventory;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use log::info;
use thiserror::Error;

pub use acm::AcmStore;
pub use inventory::InventoryStore;

use crate::{
    aws::AwsContext,
    core::types::{CertificateBundle, CertificateDetails, CertificateRecord},
};

#[derive(Debug, Error)]
pub enum CertStoreError {
    #[error("certificate is empty")]
    CertificateMissing,
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("certificate repository unavailable: {0}")]
    Unavailable(String),
    #[error("certificate repository error: {0}")]
    Store(String),
}

pub trait CertStore: Send + Sync {
    /// Short label used in log lines.
    fn name(&self) -> &'static str;

    /// Every certificate the repository knows about, in enumeration order.
    fn list(&self) -> Result<Vec<CertificateRecord>, CertStoreError>;

    /// Imports certificate material. With `existing_id` the entry is replaced
    /// in place; without it a new entry is created. Returns the entry's id.
    fn import(
        &self,
        bundle: &CertificateBundle,
        existing_id: Option<&str>,
    ) -> Result<String, CertStoreError>;

    /// Finds the certificate whose alternative names contain `domain`.
    fn find_by_domain(&self, domain: &str) -> Result<Option<CertificateRecord>, CertStoreError> {
        Ok(select_match(self.list()?, domain))
    }

    /// Read-only projection used for the renewal decision.
    fn load(&self, domain: &str) -> Result<Option<CertificateDetails>, CertStoreError> {
        Ok(self.find_by_domain(domain)?.map(|record| record.details()))
    }

    /// Imports `bundle` for `domain`, updating the domain's existing entry if
    /// there is one.
    fn store(&self, bundle: &CertificateBundle, domain: &str) -> Result<String, CertStoreError> {
        if bundle.certificate_pem.trim().is_empty() {
            return Err(CertStoreError::CertificateMissing);
        }

        info!("[{domain}] {}: finding existing certificate", self.name());
        let existing = self.find_by_domain(domain)?;
        let existing_id = existing.as_ref().map(|record| record.id.as_str());
        if let Some(id) = existing_id {
            info!("[{domain}] {}: found existing certificate '{id}'", self.name());
        }

        let id = self.import(bundle, existing_id)?;
        info!("[{domain}] {}: imported certificate as '{id}'", self.name());
        Ok(id)
    }
}

/// Picks the certificate covering `domain`. When several match, the one that
/// stays valid the longest wins; ties keep enumeration order.
pub fn select_match(records: Vec<CertificateRecord>, domain: &str) -> Option<CertificateRecord> {
    records
        .into_iter()
        .filter(|record| record.covers(domain))
        .reduce(|best, candidate| {
            if candidate.not_after > best.not_after {
                candidate
            } else {
                best
            }
        })
}

/// Supported certificate repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CertStoreKind {
    /// AWS Certificate Manager
    #[default]
    Acm,
    /// Local SQLite certificate inventory
    Inventory,
}

pub fn create_cert_store(
    kind: CertStoreKind,
    inventory_path: &Path,
    aws: &AwsContext,
) -> Result<Arc<dyn CertStore>> {
    let store: Arc<dyn CertStore> = match kind {
        CertStoreKind::Acm => Arc::new(AcmStore::new(aws)),
        CertStoreKind::Inventory => Arc::new(InventoryStore::open(inventory_path)?),
    };
    info!("[storage] using {} certificate repository", store.name());
    Ok(store)
}
