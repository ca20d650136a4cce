// Thin regex front end mapping free-text commands to structured intents

use std::sync::LazyLock;

use regex::Regex;

use crate::onboarding::EnvKind;

static ONBOARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^onboard\s+(\w[\w -]*\w|\w)$").unwrap());
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^status\s+(?:of\s+)?(\w[\w -]*\w|\w)$").unwrap());
static MOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^move\s+(\w[\w -]*\w|\w)\s+to\s+(dev|staging|prod)$").unwrap());
static PREPARE_PROD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^prepare\s+prod\s+(?:for\s+)?(\w[\w -]*\w|\w)$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum CommandIntent {
    Onboard { client: String },
    Status { client: String },
    Move { client: String, env: EnvKind },
    PrepareProd { client: String },
    Unknown,
}

/// Parse a natural-language command into a structured intent
pub fn parse_intent(text: &str) -> CommandIntent {
    let text = text.trim();

    if let Some(captures) = ONBOARD_RE.captures(text) {
        return CommandIntent::Onboard {
            client: captures[1].to_string(),
        };
    }

    if let Some(captures) = STATUS_RE.captures(text) {
        return CommandIntent::Status {
            client: captures[1].to_string(),
        };
    }

    if let Some(captures) = MOVE_RE.captures(text) {
        let env = captures[2].to_lowercase().parse().expect("regex admits only valid envs");
        return CommandIntent::Move {
            client: captures[1].to_string(),
            env,
        };
    }

    if let Some(captures) = PREPARE_PROD_RE.captures(text) {
        return CommandIntent::PrepareProd {
            client: captures[1].to_string(),
        };
    }

    CommandIntent::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onboard() {
        assert_eq!(
            parse_intent("Onboard Acme"),
            CommandIntent::Onboard {
                client: "Acme".to_string()
            }
        );
        assert_eq!(
            parse_intent("onboard Acme Corp"),
            CommandIntent::Onboard {
                client: "Acme Corp".to_string()
            }
        );
    }

    #[test]
    fn test_parse_status_with_optional_of() {
        assert_eq!(
            parse_intent("status of Galaxy"),
            CommandIntent::Status {
                client: "Galaxy".to_string()
            }
        );
        assert_eq!(
            parse_intent("Status Galaxy"),
            CommandIntent::Status {
                client: "Galaxy".to_string()
            }
        );
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(
            parse_intent("move Acme to staging"),
            CommandIntent::Move {
                client: "Acme".to_string(),
                env: EnvKind::Staging
            }
        );
        // Unknown environments don't parse as moves
        assert_eq!(parse_intent("move Acme to qa"), CommandIntent::Unknown);
    }

    #[test]
    fn test_parse_prepare_prod() {
        assert_eq!(
            parse_intent("prepare prod for Acme"),
            CommandIntent::PrepareProd {
                client: "Acme".to_string()
            }
        );
        assert_eq!(
            parse_intent("Prepare Prod Acme"),
            CommandIntent::PrepareProd {
                client: "Acme".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_commands() {
        assert_eq!(parse_intent("delete Acme"), CommandIntent::Unknown);
        assert_eq!(parse_intent(""), CommandIntent::Unknown);
    }
}
