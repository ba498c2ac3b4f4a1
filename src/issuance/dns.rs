use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("no hosted zone found for {0}")]
    ZoneNotFound(String),
    #[error("dns provider error: {0}")]
    Provider(String),
    #[error("dns change did not propagate: {0}")]
    Propagation(String),
}

/// DNS-01 proof of domain control.
///
/// `value` is the TXT record content the CA expects under
/// [`record_name`] of `domain`. Implementations are shared by all per-domain
/// tasks and must tolerate concurrent calls for different domains.
pub trait ChallengeProvider: Send + Sync {
    fn present(&self, domain: &str, value: &str) -> Result<(), ChallengeError>;
    fn cleanup(&self, domain: &str, value: &str) -> Result<(), ChallengeError>;
}

/// Name of the TXT record holding the DNS-01 proof for `domain`.
pub fn record_name(domain: &str) -> String {
    let trimmed = domain.trim_end_matches('.');
    let trimmed = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    if trimmed.starts_with("_acme-challenge.") {
        trimmed.to_string()
    } else {
        format!("_acme-challenge.{trimmed}")
    }
}

/// TXT values are stored quoted.
pub fn quote_txt(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed.to_string()
    } else {
        format!("\"{}\"", trimmed.trim_matches('"'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_name_prefixes_once() {
        assert_eq!(record_name("example.com."), "_acme-challenge.example.com");
        assert_eq!(record_name("_acme-challenge.example.com"), "_acme-challenge.example.com");
        assert_eq!(record_name("*.example.com"), "_acme-challenge.example.com");
    }

    #[test]
    fn quotes_txt_values() {
        assert_eq!(quote_txt("abc"), "\"abc\"");
        assert_eq!(quote_txt("\"abc\""), "\"abc\"");
        assert_eq!(quote_txt(" abc "), "\"abc\"");
    }
}
