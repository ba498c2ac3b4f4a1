//! PEM handling for issued certificates.
//!
//! The CA hands back a full chain; repositories want the leaf and the issuer
//! chain separately, and the inventory needs expiry and alternative names out
//! of the leaf.

use chrono::{DateTime, TimeZone, Utc};
use pem::{EncodeConfig, LineEnding, Pem};
use sha2::{Digest, Sha256};
use x509_parser::{extensions::GeneralName, pem::parse_x509_pem};
use zeroize::Zeroizing;

use super::CertStoreError;
use crate::core::types::CertificateBundle;

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Metadata extracted from a leaf certificate.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub sans: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
    pub fingerprint: String,
    pub issuer: String,
}

/// Splits a PEM chain into its leaf certificate and the remaining issuer chain.
pub fn split_chain(chain_pem: &str) -> Result<(String, String), CertStoreError> {
    let blocks = pem::parse_many(chain_pem)
        .map_err(|err| CertStoreError::InvalidCertificate(format!("unable to parse PEM: {err}")))?;
    let mut certificates = blocks.iter().filter(|block| block.tag() == CERTIFICATE_TAG);

    let leaf = certificates
        .next()
        .ok_or(CertStoreError::CertificateMissing)?;
    let chain: String = certificates.map(encode).collect();

    Ok((encode(leaf), chain))
}

/// Builds a bundle from the chain and key downloaded from the CA.
pub fn bundle_from_chain(
    domain: &str,
    chain_pem: &str,
    private_key_pem: &str,
) -> Result<CertificateBundle, CertStoreError> {
    let (certificate_pem, issuer_chain_pem) = split_chain(chain_pem)?;
    Ok(CertificateBundle {
        domain: domain.to_string(),
        certificate_pem,
        issuer_chain_pem,
        private_key_pem: Zeroizing::new(private_key_pem.to_string()),
    })
}

/// Parses validity, alternative names and identity of a PEM leaf certificate.
pub fn parse_certificate(certificate_pem: &str) -> Result<ParsedCertificate, CertStoreError> {
    let (_, pem_block) = parse_x509_pem(certificate_pem.as_bytes()).map_err(|err| {
        CertStoreError::InvalidCertificate(format!("failed to parse certificate PEM: {err}"))
    })?;
    let cert = pem_block
        .parse_x509()
        .map_err(|err| CertStoreError::InvalidCertificate(err.to_string()))?;

    let sans = match cert.subject_alternative_name() {
        Ok(Some(extension)) => extension
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(err) => {
            return Err(CertStoreError::InvalidCertificate(format!(
                "invalid subject alternative name extension: {err}"
            )));
        }
    };

    let not_before = timestamp(cert.validity().not_before.timestamp())?;
    let not_after = timestamp(cert.validity().not_after.timestamp())?;
    let fingerprint = {
        let mut hasher = Sha256::new();
        hasher.update(cert.as_raw());
        hex::encode(hasher.finalize())
    };

    Ok(ParsedCertificate {
        sans,
        not_before,
        not_after,
        serial: cert.raw_serial_as_string(),
        fingerprint,
        issuer: cert.issuer().to_string(),
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, CertStoreError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CertStoreError::InvalidCertificate(format!("timestamp out of range: {secs}")))
}

fn encode(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}
