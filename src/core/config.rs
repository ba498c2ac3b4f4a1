//! Command line and payload configuration.
//!
//! Both entry points (`obtain` flags and the serverless JSON payload) resolve
//! into one validated [`ObtainConfig`] before any AWS client is built.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    core::types::{KeyType, RenewalPolicy},
    domain::normalize_domains,
    secrets::SecretStoreKind,
    storage::CertStoreKind,
};

pub const DEFAULT_CONFIG_DIR: &str = "/tmp";
pub const DEFAULT_RENEW_BEFORE_DAYS: u32 = 30;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_INVENTORY_PATH: &str = "certpilot-inventory.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("domains list must not be empty")]
    MissingDomains,
    #[error("email must be filled")]
    MissingEmail,
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("renewal threshold must be at least one day")]
    InvalidRenewBefore,
    #[error("task timeout must be at least one second")]
    InvalidTimeout,
    #[error("unable to read payload '{path}': {reason}")]
    Payload { path: String, reason: String },
}

/// certpilot - obtain and renew Let's Encrypt certificates through Route 53 DNS-01
#[derive(Parser, Debug)]
#[command(name = "certpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    pub verbose: bool,

    /// AWS region; defaults to the SDK provider chain
    #[arg(long = "region", env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create new certificates or renew existing ones for the given domains
    Obtain(ObtainArgs),
    /// Run once from a JSON event in the serverless payload shape
    Payload {
        /// Path to the JSON payload
        #[arg(value_name = "FILE")]
        path: PathBuf,

        #[command(flatten)]
        backend: BackendArgs,
    },
}

#[derive(Args, Debug)]
pub struct ObtainArgs {
    /// Domains to obtain certificates for (comma separated or repeated)
    #[arg(short = 'd', long = "domains", env = "CERTPILOT_DOMAINS", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Contact email for the ACME account
    #[arg(short = 'e', long = "email", env = "CERTPILOT_EMAIL")]
    pub email: Option<String>,

    /// Renew when fewer than this many days remain
    #[arg(long = "renew-before", default_value_t = DEFAULT_RENEW_BEFORE_DAYS)]
    pub renew_before: u32,

    /// Where account keys are stored
    #[arg(long = "secret-store", value_enum, default_value_t = SecretStoreKind::File)]
    pub secret_store: SecretStoreKind,

    /// Directory for the file store, name prefix for the remote stores
    #[arg(long = "config-dir", default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Use the Let's Encrypt staging environment
    #[arg(long = "staging")]
    pub staging: bool,

    /// SNS topic ARN notified after each issued certificate
    #[arg(long = "topic", env = "CERTPILOT_TOPIC")]
    pub topic: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Settings shared by both entry points.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Certificate repository
    #[arg(long = "cert-store", value_enum, default_value_t = CertStoreKind::Acm)]
    pub cert_store: CertStoreKind,

    /// SQLite file used by the inventory repository
    #[arg(long = "inventory-path", default_value = DEFAULT_INVENTORY_PATH)]
    pub inventory_path: PathBuf,

    /// Key algorithm for issued certificates
    #[arg(long = "key-type", value_enum, default_value_t = KeyType::Rsa2048)]
    pub key_type: KeyType,

    /// Route 53 hosted zone to use instead of discovering one per domain
    #[arg(long = "hosted-zone-id")]
    pub hosted_zone_id: Option<String>,

    /// Per-domain deadline in seconds
    #[arg(long = "task-timeout", default_value_t = DEFAULT_TASK_TIMEOUT_SECS)]
    pub task_timeout: u64,
}

impl Default for BackendArgs {
    fn default() -> Self {
        Self {
            cert_store: CertStoreKind::Acm,
            inventory_path: PathBuf::from(DEFAULT_INVENTORY_PATH),
            key_type: KeyType::Rsa2048,
            hosted_zone_id: None,
            task_timeout: DEFAULT_TASK_TIMEOUT_SECS,
        }
    }
}

/// `staging` arrives as a string in the serverless payload; plain booleans
/// are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PayloadFlag {
    Bool(bool),
    Text(String),
}

impl PayloadFlag {
    pub fn enabled(&self) -> bool {
        match self {
            PayloadFlag::Bool(value) => *value,
            PayloadFlag::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
        }
    }
}

/// Event accepted by the `payload` subcommand.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LambdaPayload {
    pub domains: Vec<String>,
    pub email: String,
    pub staging: Option<PayloadFlag>,
    pub topic: String,
    pub renew_before: u32,
    pub secret_store_type: String,
    pub secret_store_prefix: String,
}

impl LambdaPayload {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let payload_error = |reason: String| ConfigError::Payload {
            path: path.display().to_string(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|err| payload_error(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| payload_error(err.to_string()))
    }
}

/// Validated settings for one `obtain` run.
#[derive(Debug, Clone)]
pub struct ObtainConfig {
    pub domains: Vec<String>,
    pub email: String,
    pub policy: RenewalPolicy,
    pub staging: bool,
    pub topic: Option<String>,
    pub secret_store: SecretStoreKind,
    pub secret_location: PathBuf,
    pub cert_store: CertStoreKind,
    pub inventory_path: PathBuf,
    pub key_type: KeyType,
    pub hosted_zone_id: Option<String>,
    pub task_timeout: Duration,
    pub region: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> Result<ObtainConfig, ConfigError> {
        let region = self.region;
        let mut config = match self.command {
            Command::Obtain(args) => ObtainConfig::from_args(args)?,
            Command::Payload { path, backend } => {
                ObtainConfig::from_payload(LambdaPayload::from_file(&path)?, backend)?
            }
        };
        config.region = region;
        Ok(config)
    }
}

impl ObtainConfig {
    pub fn from_args(args: ObtainArgs) -> Result<Self, ConfigError> {
        Self::build(
            &args.domains,
            args.email.as_deref().unwrap_or_default(),
            args.renew_before,
            args.staging,
            args.topic,
            args.secret_store,
            args.config_dir,
            args.backend,
        )
    }

    pub fn from_payload(payload: LambdaPayload, backend: BackendArgs) -> Result<Self, ConfigError> {
        let renew_before = match payload.renew_before {
            0 => DEFAULT_RENEW_BEFORE_DAYS,
            days => days,
        };
        let location = match payload.secret_store_prefix.trim() {
            "" => PathBuf::from(DEFAULT_CONFIG_DIR),
            prefix => PathBuf::from(prefix),
        };
        Self::build(
            &payload.domains,
            &payload.email,
            renew_before,
            payload.staging.as_ref().is_some_and(PayloadFlag::enabled),
            Some(payload.topic),
            SecretStoreKind::from_tag(&payload.secret_store_type),
            location,
            backend,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        domains: &[String],
        email: &str,
        renew_before_days: u32,
        staging: bool,
        topic: Option<String>,
        secret_store: SecretStoreKind,
        secret_location: PathBuf,
        backend: BackendArgs,
    ) -> Result<Self, ConfigError> {
        let domains =
            normalize_domains(domains).map_err(|err| ConfigError::InvalidDomain(err.to_string()))?;
        if domains.is_empty() {
            return Err(ConfigError::MissingDomains);
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(ConfigError::MissingEmail);
        }
        if renew_before_days == 0 {
            return Err(ConfigError::InvalidRenewBefore);
        }
        if backend.task_timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self {
            domains,
            email: email.to_string(),
            policy: RenewalPolicy::from_days(renew_before_days),
            staging,
            topic: topic.filter(|t| !t.trim().is_empty()),
            secret_store,
            secret_location,
            cert_store: backend.cert_store,
            inventory_path: backend.inventory_path,
            key_type: backend.key_type,
            hosted_zone_id: backend.hosted_zone_id.filter(|z| !z.trim().is_empty()),
            task_timeout: Duration::from_secs(backend.task_timeout),
            region: None,
        })
    }
}
