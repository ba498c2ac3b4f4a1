use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    aws::AwsContext,
    core::config::ObtainConfig,
    issuance::{
        AcmeLibClientFactory, CertificateOrchestrator, DomainOutcome, FanOutDriver, Notification,
        ObtainOutcome, OrchestratorOptions, Route53Provider,
    },
    notify::SnsNotifier,
    secrets::create_secret_store,
    storage::create_cert_store,
};

/// Tally of one run, logged once every domain has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub issued: usize,
    pub not_due: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[DomainOutcome]) -> Self {
        outcomes
            .iter()
            .fold(RunSummary::default(), |mut summary, outcome| {
                match &outcome.result {
                    Ok(ObtainOutcome::Issued { .. }) => summary.issued += 1,
                    Ok(ObtainOutcome::NotDue { .. }) => summary.not_due += 1,
                    Err(_) => summary.failed += 1,
                }
                summary
            })
    }
}

/// Builds the orchestrator from already-loaded AWS configuration.
pub fn build_orchestrator(config: &ObtainConfig, aws: &AwsContext) -> Result<CertificateOrchestrator> {
    let secret_store = create_secret_store(config.secret_store, &config.secret_location, aws)
        .context("unable to init secret store")?;
    let cert_store = create_cert_store(config.cert_store, &config.inventory_path, aws)
        .context("unable to init certificate repository")?;

    let notification = config.topic.as_ref().map(|topic| Notification {
        topic: topic.clone(),
        notifier: Arc::new(SnsNotifier::new(aws)),
    });

    Ok(CertificateOrchestrator::new(OrchestratorOptions {
        staging: config.staging,
        policy: config.policy,
        notification,
        secret_store,
        cert_store,
        challenge_provider: Arc::new(Route53Provider::new(aws, config.hosted_zone_id.clone())),
        client_factory: Arc::new(AcmeLibClientFactory::new(config.key_type)),
    }))
}

/// Obtains or renews a certificate for every configured domain.
///
/// Per-domain failures only show up in the returned outcomes and the log; an
/// error here means the run could not start.
pub async fn obtain(config: ObtainConfig) -> Result<Vec<DomainOutcome>> {
    info!(
        "[obtain] {} domain(s), renew before {}h, staging: {}",
        config.domains.len(),
        config.policy.renew_before_hours,
        config.staging
    );

    let aws = AwsContext::load(config.region.clone()).await;
    let orchestrator = Arc::new(build_orchestrator(&config, &aws)?);
    let driver = FanOutDriver::new(orchestrator, config.task_timeout);

    let outcomes = driver.run(&config.domains, &config.email).await;

    let summary = RunSummary::from_outcomes(&outcomes);
    if summary.failed > 0 {
        warn!(
            "[obtain] finished: {} issued, {} not due, {} failed",
            summary.issued, summary.not_due, summary.failed
        );
    } else {
        info!(
            "[obtain] finished: {} issued, {} not due",
            summary.issued, summary.not_due
        );
    }
    Ok(outcomes)
}
