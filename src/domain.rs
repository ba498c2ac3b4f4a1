use anyhow::{Result, anyhow};

/// Normalizes a hostname to the ASCII, lowercase, no-trailing-dot form used
/// for lookups, record names and secret keys.
pub fn normalize_domain(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(anyhow!("domain name is required"));
    }
    if let Some(base) = trimmed.strip_prefix("*.") {
        return Ok(format!("*.{}", normalize_domain(base)?));
    }
    let ascii = idna::domain_to_ascii(trimmed)
        .map_err(|err| anyhow!("invalid domain name '{trimmed}': {err}"))?;
    Ok(ascii.to_lowercase())
}

/// Normalizes every requested domain, dropping blanks and duplicates while
/// keeping the order in which they were requested.
///
/// A name and its wildcard (`example.com`, `*.example.com`) are validated
/// through the same `_acme-challenge` record, so they cannot be requested in
/// the same run.
pub fn normalize_domains<S: AsRef<str>>(domains: &[S]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(domains.len());
    for raw in domains {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        let domain = normalize_domain(raw)?;
        if !normalized.contains(&domain) {
            normalized.push(domain);
        }
    }

    if let Some(wildcard) = normalized.iter().find(|domain| {
        domain
            .strip_prefix("*.")
            .is_some_and(|base| normalized.iter().any(|other| other == base))
    }) {
        return Err(anyhow!(
            "'{wildcard}' and '{}' share a DNS challenge record; request them in separate runs",
            &wildcard[2..]
        ));
    }
    Ok(normalized)
}

/// True when `domain` equals `zone` or sits underneath it.
pub fn is_within_zone(domain: &str, zone: &str) -> bool {
    let Ok(domain) = normalize_domain(domain) else {
        return false;
    };
    let Ok(zone) = normalize_domain(zone) else {
        return false;
    };
    domain == zone || domain.ends_with(&format!(".{zone}"))
}
