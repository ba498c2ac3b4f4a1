//! Certificate issuance: the per-domain orchestrator, the fan-out driver and
//! the ACME and DNS-01 collaborators they drive.

pub mod account;
pub mod acme_workflow;
pub mod dns;
pub mod dns_providers;
pub mod fanout;
pub mod issuer;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use acme_workflow::AcmeLibClientFactory;
pub use dns::{ChallengeError, ChallengeProvider};
pub use dns_providers::Route53Provider;
pub use fanout::{DEFAULT_TASK_TIMEOUT, DomainFailure, DomainOutcome, FailureKind, FanOutDriver};
pub use issuer::{AcmeClient, ClientFactory, IssuerError};
pub use orchestrator::{
    CertificateOrchestrator, ErrorKind, NotificationStatus, Notification, ObtainError, ObtainOutcome,
    OrchestratorOptions,
};
