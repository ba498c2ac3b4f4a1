use std::{collections::HashMap, sync::Mutex, time::Duration};

use aws_sdk_route53::{
    Client,
    error::DisplayErrorContext,
    types::{Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType},
};
use log::{debug, info};

use super::retry::wait_until;
use crate::{
    aws::AwsContext,
    domain::is_within_zone,
    issuance::dns::{ChallengeError, ChallengeProvider, quote_txt, record_name},
};

const TXT_TTL: i64 = 60;
const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(4);

/// DNS-01 challenge provider backed by Route 53.
///
/// The hosted zone for a domain is the most specific zone whose name is a
/// suffix of the domain, unless a zone id is pinned at construction.
pub struct Route53Provider {
    aws: AwsContext,
    client: Client,
    hosted_zone_id: Option<String>,
    zone_cache: Mutex<HashMap<String, String>>,
}

impl Route53Provider {
    pub fn new(aws: &AwsContext, hosted_zone_id: Option<String>) -> Self {
        Self {
            client: Client::new(aws.config()),
            aws: aws.clone(),
            hosted_zone_id: hosted_zone_id.map(|id| strip_zone_prefix(&id).to_string()),
            zone_cache: Mutex::new(HashMap::new()),
        }
    }

    fn zone_for(&self, domain: &str) -> Result<String, ChallengeError> {
        if let Some(zone_id) = &self.hosted_zone_id {
            return Ok(zone_id.clone());
        }
        if let Some(zone_id) = self
            .zone_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(domain).cloned())
        {
            return Ok(zone_id);
        }

        let zones = self.aws.block_on(self.list_zones())?;
        let zone_id =
            best_zone(domain, &zones).ok_or_else(|| ChallengeError::ZoneNotFound(domain.to_string()))?;
        debug!("[route53] using hosted zone {zone_id} for {domain}");

        if let Ok(mut cache) = self.zone_cache.lock() {
            cache.insert(domain.to_string(), zone_id.clone());
        }
        Ok(zone_id)
    }

    async fn list_zones(&self) -> Result<Vec<(String, String)>, ChallengeError> {
        let mut zones = Vec::new();
        let mut paginator = self
            .client
            .list_hosted_zones()
            .into_paginator()
            .page_size(100)
            .send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|err| {
                ChallengeError::Provider(format!(
                    "failed to list Route 53 hosted zones: {}",
                    DisplayErrorContext(&err)
                ))
            })?;
            for zone in page.hosted_zones() {
                zones.push((
                    zone.name().trim_end_matches('.').to_string(),
                    strip_zone_prefix(zone.id()).to_string(),
                ));
            }
        }
        Ok(zones)
    }

    fn change_txt(
        &self,
        action: ChangeAction,
        zone_id: &str,
        fqdn: &str,
        value: &str,
    ) -> Result<(), ChallengeError> {
        let record_set = ResourceRecordSet::builder()
            .name(fqdn)
            .r#type(RrType::Txt)
            .ttl(TXT_TTL)
            .resource_records(
                ResourceRecord::builder()
                    .value(quote_txt(value))
                    .build()
                    .map_err(|e| ChallengeError::Provider(format!("failed to build ResourceRecord: {e}")))?,
            )
            .build()
            .map_err(|e| ChallengeError::Provider(format!("failed to build ResourceRecordSet: {e}")))?;

        let change = Change::builder()
            .action(action)
            .resource_record_set(record_set)
            .build()
            .map_err(|e| ChallengeError::Provider(format!("failed to build Change: {e}")))?;

        let change_batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(|e| ChallengeError::Provider(format!("failed to build ChangeBatch: {e}")))?;

        self.aws
            .block_on(
                self.client
                    .change_resource_record_sets()
                    .hosted_zone_id(zone_id)
                    .change_batch(change_batch)
                    .send(),
            )
            .map_err(|err| {
                ChallengeError::Provider(format!(
                    "failed to change Route 53 TXT record {fqdn}: {}",
                    DisplayErrorContext(&err)
                ))
            })?;
        Ok(())
    }

    async fn record_visible(&self, zone_id: &str, fqdn: &str, value: &str) -> Result<bool, ChallengeError> {
        let response = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(fqdn)
            .start_record_type(RrType::Txt)
            .max_items(1)
            .send()
            .await
            .map_err(|err| {
                ChallengeError::Provider(format!(
                    "failed to list Route 53 DNS records: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let expected = quote_txt(value);
        let visible = response
            .resource_record_sets()
            .iter()
            .filter(|rs| same_name(rs.name(), fqdn) && rs.r#type() == &RrType::Txt)
            .any(|rs| rs.resource_records().iter().any(|record| record.value() == expected));
        Ok(visible)
    }
}

impl ChallengeProvider for Route53Provider {
    fn present(&self, domain: &str, value: &str) -> Result<(), ChallengeError> {
        let zone_id = self.zone_for(domain)?;
        let fqdn = format!("{}.", record_name(domain));

        self.change_txt(ChangeAction::Upsert, &zone_id, &fqdn, value)?;
        info!("[{domain}] route53: TXT record {fqdn} upserted in zone {zone_id}");

        wait_until(&fqdn, "route53 upsert", PROPAGATION_TIMEOUT, POLL_INTERVAL, || {
            self.aws.block_on(self.record_visible(&zone_id, &fqdn, value))
        })
    }

    fn cleanup(&self, domain: &str, value: &str) -> Result<(), ChallengeError> {
        let zone_id = self.zone_for(domain)?;
        let fqdn = format!("{}.", record_name(domain));

        self.change_txt(ChangeAction::Delete, &zone_id, &fqdn, value)?;
        info!("[{domain}] route53: TXT record {fqdn} removed");
        Ok(())
    }
}

fn strip_zone_prefix(id: &str) -> &str {
    id.strip_prefix("/hostedzone/").unwrap_or(id)
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.').eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Most specific zone (longest name) containing `domain`.
fn best_zone(domain: &str, zones: &[(String, String)]) -> Option<String> {
    zones
        .iter()
        .filter(|(name, _)| is_within_zone(domain, name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<(String, String)> {
        vec![
            ("example.com".to_string(), "Z1".to_string()),
            ("dev.example.com".to_string(), "Z2".to_string()),
            ("other.org".to_string(), "Z3".to_string()),
        ]
    }

    #[test]
    fn picks_most_specific_zone() {
        assert_eq!(best_zone("api.dev.example.com", &zones()).as_deref(), Some("Z2"));
        assert_eq!(best_zone("www.example.com", &zones()).as_deref(), Some("Z1"));
        assert_eq!(best_zone("example.com", &zones()).as_deref(), Some("Z1"));
    }

    #[test]
    fn no_zone_for_unrelated_domain() {
        assert!(best_zone("example.net", &zones()).is_none());
    }

    #[test]
    fn strips_hosted_zone_prefix() {
        assert_eq!(strip_zone_prefix("/hostedzone/Z123"), "Z123");
        assert_eq!(strip_zone_prefix("Z123"), "Z123");
    }

    #[test]
    fn record_names_compare_without_trailing_dot() {
        assert!(same_name("_acme-challenge.example.com.", "_acme-challenge.example.com"));
        assert!(!same_name("_acme-challenge.example.com.", "_acme-challenge.example.org."));
    }
}
