// PII redaction for logged command text.
//
// LANIDs and email addresses are replaced with stable short hashes so log
// lines stay correlatable; ticket ids keep their system prefix only.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

static LANID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,3}-\d+\b").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static TICKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(SN|GW|JIRA)-\d+\b").unwrap());

fn short_hash(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

/// Redact PII from free text before it reaches a log line
pub fn redact(text: &str) -> String {
    // Ticket ids first: they also match the LANID shape
    let text = TICKET_RE.replace_all(text, |caps: &regex::Captures| {
        format!("{}-****", &caps[1])
    });
    let text = LANID_RE.replace_all(&text, |caps: &regex::Captures| {
        format!("LANID-{}", short_hash(&caps[0]))
    });
    let text = EMAIL_RE.replace_all(&text, |caps: &regex::Captures| {
        format!("EMAIL-{}", short_hash(&caps[0]))
    });
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_lanids_stably() {
        let first = redact("grant access for AB-1234");
        let second = redact("grant access for AB-1234");
        assert_eq!(first, second);
        assert!(!first.contains("AB-1234"));
        assert!(first.contains("LANID-"));
    }

    #[test]
    fn test_redacts_email_addresses() {
        let redacted = redact("notify lead@example.com when done");
        assert!(!redacted.contains("lead@example.com"));
        assert!(redacted.contains("EMAIL-"));
    }

    #[test]
    fn test_masks_ticket_ids_keeping_prefix() {
        let redacted = redact("see SN-1234 and GW-99");
        assert_eq!(redacted, "see SN-**** and GW-****");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(redact("onboard Acme"), "onboard Acme");
    }
}
