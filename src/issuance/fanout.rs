use std::{fmt, sync::Arc, time::Duration};

use log::{error, info};
use tokio::{task::JoinSet, time::timeout};

use super::orchestrator::{CertificateOrchestrator, ErrorKind, ObtainOutcome};
use crate::core::types::DomainRequest;

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Obtain(ErrorKind),
    /// The task outlived its deadline. The blocking work is abandoned, not
    /// interrupted.
    TimedOut,
    /// The task panicked or was cancelled.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Obtain(kind) => f.write_str(kind.as_str()),
            FailureKind::TimedOut => f.write_str("timed out"),
            FailureKind::Aborted => f.write_str("aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOutcome {
    pub domain: String,
    pub result: Result<ObtainOutcome, DomainFailure>,
}

impl DomainOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    fn failed(domain: String, kind: FailureKind, message: String) -> Self {
        Self {
            domain,
            result: Err(DomainFailure { kind, message }),
        }
    }
}

/// Runs the orchestrator for every domain at once and waits for all of them.
pub struct FanOutDriver {
    orchestrator: Arc<CertificateOrchestrator>,
    task_timeout: Duration,
}

impl FanOutDriver {
    pub fn new(orchestrator: Arc<CertificateOrchestrator>, task_timeout: Duration) -> Self {
        Self {
            orchestrator,
            task_timeout,
        }
    }

    /// One task per domain, no concurrency cap. A failing, panicking or
    /// hung task only affects its own outcome. Outcomes come back in request
    /// order.
    pub async fn run(&self, domains: &[String], email: &str) -> Vec<DomainOutcome> {
        let mut tasks = JoinSet::new();

        for (index, domain) in domains.iter().enumerate() {
            let orchestrator = self.orchestrator.clone();
            let request = DomainRequest {
                domain: domain.clone(),
                email: email.to_string(),
            };
            let domain = domain.clone();
            let deadline = self.task_timeout;

            tasks.spawn(async move {
                let work = tokio::task::spawn_blocking(move || {
                    orchestrator.obtain(&request.domain, &request.email)
                });
                let outcome = match timeout(deadline, work).await {
                    Ok(Ok(Ok(outcome))) => DomainOutcome {
                        domain,
                        result: Ok(outcome),
                    },
                    Ok(Ok(Err(err))) => {
                        DomainOutcome::failed(domain, FailureKind::Obtain(err.kind()), err.to_string())
                    }
                    Ok(Err(join_err)) => {
                        DomainOutcome::failed(domain, FailureKind::Aborted, join_err.to_string())
                    }
                    Err(_) => DomainOutcome::failed(
                        domain,
                        FailureKind::TimedOut,
                        format!("no result after {}s", deadline.as_secs()),
                    ),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<DomainOutcome>> = vec![None; domains.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(err) => error!("[fanout] task failed to join: {err}"),
            }
        }

        let outcomes: Vec<DomainOutcome> = slots
            .into_iter()
            .zip(domains)
            .map(|(slot, domain)| {
                slot.unwrap_or_else(|| {
                    DomainOutcome::failed(domain.clone(), FailureKind::Aborted, "task lost".into())
                })
            })
            .collect();

        for outcome in &outcomes {
            match &outcome.result {
                Ok(ObtainOutcome::NotDue { .. }) => {
                    info!("[{}] certificate not due for renewal", outcome.domain)
                }
                Ok(ObtainOutcome::Issued { certificate_id, .. }) => {
                    info!("[{}] certificate obtained: {certificate_id}", outcome.domain)
                }
                Err(failure) => error!(
                    "[{}] unable to obtain certificate ({}): {}",
                    outcome.domain, failure.kind, failure.message
                ),
            }
        }
        outcomes
    }
}
