use std::fmt;

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

/// One unit of work for the orchestrator: a domain and the contact email used
/// for the ACME account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRequest {
    pub domain: String,
    pub email: String,
}

/// The repository's view of a certificate already deployed for a domain.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    /// Opaque repository handle (ACM ARN, inventory id) used for update-in-place.
    pub id: String,
    /// Certificate validity start date, when the repository reports it
    pub not_before: Option<DateTime<Utc>>,
    /// Certificate validity end date
    pub not_after: DateTime<Utc>,
    /// Subject Alternative Names the certificate is valid for
    pub sans: Vec<String>,
}

impl CertificateRecord {
    /// Returns true when `domain` is one of the certificate's alternative names.
    pub fn covers(&self, domain: &str) -> bool {
        self.sans.iter().any(|name| name == domain)
    }

    pub fn details(&self) -> CertificateDetails {
        CertificateDetails {
            not_after: self.not_after,
            alt_names: self.sans.clone(),
        }
    }
}

/// Read-only projection used by the renewal decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub not_after: DateTime<Utc>,
    pub alt_names: Vec<String>,
}

/// Certificate material returned by the certificate authority.
///
/// Consumed by the certificate store and then dropped; the private key is
/// wiped from memory on drop.
#[derive(Clone)]
pub struct CertificateBundle {
    pub domain: String,
    /// PEM-encoded leaf certificate
    pub certificate_pem: String,
    /// PEM-encoded issuer chain (may be empty)
    pub issuer_chain_pem: String,
    /// PEM-encoded private key for the leaf certificate
    pub private_key_pem: Zeroizing<String>,
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("domain", &self.domain)
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("issuer_chain_pem_len", &self.issuer_chain_pem.len())
            .finish_non_exhaustive()
    }
}

/// Threshold below which a certificate is reissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    pub renew_before_hours: i64,
}

impl RenewalPolicy {
    pub fn from_days(days: u32) -> Self {
        Self {
            renew_before_hours: i64::from(days) * 24,
        }
    }

    /// Whole hours left until `not_after`, truncated toward zero.
    pub fn hours_remaining(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (not_after - now).num_hours()
    }

    /// Absence of a certificate always means renewal is due.
    pub fn decide(&self, existing: Option<&CertificateDetails>, now: DateTime<Utc>) -> RenewalDecision {
        let Some(details) = existing else {
            return RenewalDecision::Missing;
        };
        let hours = Self::hours_remaining(details.not_after, now);
        if hours > self.renew_before_hours {
            RenewalDecision::NotDue {
                hours_remaining: hours,
            }
        } else {
            RenewalDecision::Due {
                hours_remaining: hours,
            }
        }
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self::from_days(30)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    Missing,
    Due { hours_remaining: i64 },
    NotDue { hours_remaining: i64 },
}

impl RenewalDecision {
    pub fn should_issue(&self) -> bool {
        !matches!(self, RenewalDecision::NotDue { .. })
    }
}

/// Key algorithm used for the issued certificate's private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeyType {
    #[default]
    Rsa2048,
    Rsa4096,
    P256,
    P384,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa2048 => "rsa2048",
            KeyType::Rsa4096 => "rsa4096",
            KeyType::P256 => "p256",
            KeyType::P384 => "p384",
        }
    }
}

/// Convenience for tests and seeding: a record expiring `days` from `now`.
pub fn record_expiring_in(id: &str, sans: &[&str], now: DateTime<Utc>, days: i64) -> CertificateRecord {
    CertificateRecord {
        id: id.to_string(),
        not_before: Some(now - Duration::days(1)),
        not_after: now + Duration::days(days),
        sans: sans.iter().map(|s| s.to_string()).collect(),
    }
}
