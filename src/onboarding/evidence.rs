// Evidence records attached to an environment state snapshot.
// Records are immutable once attached; a transition replaces the whole bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket categories recognized by the onboarding workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketKind {
    #[serde(rename = "NSSR")]
    Nssr,
    #[serde(rename = "OAuth")]
    OAuth,
    #[serde(rename = "GLAM")]
    Glam,
    #[serde(rename = "GWAM")]
    Gwam,
}

impl TicketKind {
    /// GLAM/GWAM tickets request user access-list additions (Dev/Staging only)
    pub fn is_access_request(self) -> bool {
        matches!(self, TicketKind::Glam | TicketKind::Gwam)
    }
}

impl std::fmt::Display for TicketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TicketKind::Nssr => "NSSR",
            TicketKind::OAuth => "OAuth",
            TicketKind::Glam => "GLAM",
            TicketKind::Gwam => "GWAM",
        };
        write!(f, "{}", name)
    }
}

/// Screenshot labels required for validation evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotLabel {
    Login,
    Consent,
    Landing,
    Token,
}

impl ScreenshotLabel {
    /// All four labels must be present before an environment counts as validated
    pub const REQUIRED: [ScreenshotLabel; 4] = [
        ScreenshotLabel::Login,
        ScreenshotLabel::Consent,
        ScreenshotLabel::Landing,
        ScreenshotLabel::Token,
    ];
}

impl std::fmt::Display for ScreenshotLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScreenshotLabel::Login => "login",
            ScreenshotLabel::Consent => "consent",
            ScreenshotLabel::Landing => "landing",
            ScreenshotLabel::Token => "token",
        };
        write!(f, "{}", name)
    }
}

/// Reference to a ticket in an external ticketing system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRef {
    /// Originating system, e.g. "ServiceNow"
    pub system: String,
    pub id: String,
    pub url: Option<String>,
    pub kind: TicketKind,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TicketRef {
    pub fn new(system: impl Into<String>, id: impl Into<String>, kind: TicketKind) -> Self {
        Self {
            system: system.into(),
            id: id.into(),
            url: None,
            kind,
            status: "open".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.status.eq_ignore_ascii_case("open")
    }
}

/// Masked reference to a stored client secret. The raw secret never appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Secret manager key
    pub name: String,
    /// Last four characters for display, e.g. "****f3a9"
    pub mask: String,
    pub created_at: DateTime<Utc>,
}

impl SecretRef {
    pub fn new(name: impl Into<String>, mask: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mask: mask.into(),
            created_at: Utc::now(),
        }
    }

    /// Build the display mask from a raw secret without retaining it
    pub fn mask_of(secret: &str) -> String {
        if secret.len() >= 4 {
            format!("****{}", &secret[secret.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

/// Reference to an uploaded screenshot in object storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRef {
    /// Object storage key
    pub key: String,
    pub label: ScreenshotLabel,
    pub url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl ScreenshotRef {
    pub fn new(key: impl Into<String>, label: ScreenshotLabel) -> Self {
        Self {
            key: key.into(),
            label,
            url: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Evidence bundle attached to one environment state snapshot.
///
/// Supplied wholesale with each transition attempt; the new bundle replaces
/// the environment's stored evidence, there is no incremental merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub tickets: Vec<TicketRef>,
    #[serde(default)]
    pub secret: Option<SecretRef>,
    #[serde(default)]
    pub screenshots: Vec<ScreenshotRef>,
    /// Message ids or links of relevant emails
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Evidence {
    pub fn has_access_request_ticket(&self) -> bool {
        self.tickets.iter().any(|t| t.kind.is_access_request())
    }

    /// Required screenshot labels not yet covered by this bundle
    pub fn missing_screenshot_labels(&self) -> Vec<ScreenshotLabel> {
        ScreenshotLabel::REQUIRED
            .into_iter()
            .filter(|required| !self.screenshots.iter().any(|s| s.label == *required))
            .collect()
    }

    /// Total number of attached items, used for audit detail
    pub fn item_count(&self) -> usize {
        self.tickets.len()
            + self.screenshots.len()
            + self.emails.len()
            + usize::from(self.secret.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_mask_keeps_last_four() {
        assert_eq!(SecretRef::mask_of("super-secret-f3a9"), "****f3a9");
        assert_eq!(SecretRef::mask_of("abc"), "****");
    }

    #[test]
    fn test_missing_screenshot_labels() {
        let mut evidence = Evidence::default();
        evidence
            .screenshots
            .push(ScreenshotRef::new("s3/login.png", ScreenshotLabel::Login));
        evidence
            .screenshots
            .push(ScreenshotRef::new("s3/consent.png", ScreenshotLabel::Consent));

        let missing = evidence.missing_screenshot_labels();
        assert_eq!(
            missing,
            vec![ScreenshotLabel::Landing, ScreenshotLabel::Token]
        );
    }

    #[test]
    fn test_access_request_detection() {
        let mut evidence = Evidence::default();
        evidence
            .tickets
            .push(TicketRef::new("ServiceNow", "SN-1", TicketKind::Nssr));
        assert!(!evidence.has_access_request_ticket());

        evidence
            .tickets
            .push(TicketRef::new("ServiceNow", "GW-1", TicketKind::Glam));
        assert!(evidence.has_access_request_ticket());
    }

    #[test]
    fn test_item_count_includes_secret() {
        let mut evidence = Evidence::default();
        assert_eq!(evidence.item_count(), 0);

        evidence
            .tickets
            .push(TicketRef::new("ServiceNow", "SN-1", TicketKind::Nssr));
        evidence.secret = Some(SecretRef::new("kv/acme/dev", "****f3a9"));
        evidence.emails.push("<msg-1@onramp.local>".to_string());
        assert_eq!(evidence.item_count(), 3);
    }
}
