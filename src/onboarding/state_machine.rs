// Pure decision core for environment state transitions.
// No I/O, no mutation: every function here is a view over thread state.

use super::evidence::Evidence;
use super::types::{ClientThread, EnvKind, EnvState, Environment};

/// The ordered progression. Special states are not part of it.
pub const STATE_ORDER: [EnvState; 8] = [
    EnvState::NotStarted,
    EnvState::FormsRaised,
    EnvState::CredsIssued,
    EnvState::AccessProvisioned,
    EnvState::Validated,
    EnvState::SignoffSent,
    EnvState::Approved,
    EnvState::Complete,
];

/// States reachable from any ordinary state
pub const SPECIAL_STATES: [EnvState; 3] = [
    EnvState::Blocked,
    EnvState::ChangesRequested,
    EnvState::Abandoned,
];

/// Position of a state in the ordered progression; None for special states
pub fn order_index(state: EnvState) -> Option<usize> {
    STATE_ORDER.iter().position(|s| *s == state)
}

pub fn is_special(state: EnvState) -> bool {
    SPECIAL_STATES.contains(&state)
}

/// Structural transition check.
///
/// `rollback_origin` is the state the environment was in when it entered
/// ChangesRequested; it is only consulted when `current` is ChangesRequested.
/// With no recorded origin, any ordered-progression target is accepted.
pub fn can_transition(
    current: EnvState,
    target: EnvState,
    rollback_origin: Option<EnvState>,
) -> bool {
    // Special states can be entered from any state
    if is_special(target) {
        return true;
    }

    // ChangesRequested can only roll back to a state earlier than its origin
    if current == EnvState::ChangesRequested {
        let Some(target_idx) = order_index(target) else {
            return false;
        };
        return match rollback_origin.and_then(order_index) {
            Some(origin_idx) => target_idx < origin_idx,
            None => true,
        };
    }

    // Normal progression: must be the next state in the sequence
    match (order_index(current), order_index(target)) {
        (Some(current_idx), Some(target_idx)) => target_idx == current_idx + 1,
        _ => false,
    }
}

/// Outcome of a transition validation: the full list of failed requirements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a transition with evidence and business rules.
///
/// The structural check short-circuits; evidence requirements are evaluated
/// together so the caller sees every missing item in one pass.
pub fn validate_transition(
    current: EnvState,
    target: EnvState,
    env: EnvKind,
    evidence: &Evidence,
    thread: Option<&ClientThread>,
) -> ValidationOutcome {
    let rollback_origin = thread.and_then(|t| t.environments.get(env).rollback_origin);
    let mut errors = Vec::new();

    if !can_transition(current, target, rollback_origin) {
        errors.push(format!("Invalid transition: {} → {}", current, target));
        return ValidationOutcome { errors };
    }

    match target {
        EnvState::FormsRaised => {
            if evidence.tickets.is_empty() {
                errors.push("FormsRaised requires at least one ticket".to_string());
            }
        }
        EnvState::CredsIssued => {
            if evidence.secret.is_none() {
                errors.push("CredsIssued requires client secret evidence".to_string());
            }
        }
        EnvState::AccessProvisioned => {
            // GLAM/GWAM only required for Dev and Staging
            if env.uses_lanids() && !evidence.has_access_request_ticket() {
                errors.push(format!(
                    "{} requires GLAM/GWAM tickets for access provisioning",
                    env
                ));
            }
        }
        EnvState::Validated => {
            let missing = evidence.missing_screenshot_labels();
            if !missing.is_empty() {
                let labels: Vec<String> = missing.iter().map(|l| l.to_string()).collect();
                errors.push(format!(
                    "Validation requires screenshots: {}",
                    labels.join(", ")
                ));
            }
        }
        EnvState::SignoffSent => {
            if evidence.emails.is_empty() {
                errors.push("SignoffSent requires email evidence".to_string());
            }
        }
        EnvState::Approved => {
            // An approval email is assumed to be among the references
            if evidence.emails.is_empty() {
                errors.push("Approved requires approval email evidence".to_string());
            }
        }
        EnvState::Complete => {
            if let (Some(prev), Some(thread)) = (env.predecessor(), thread) {
                let prev_state = thread.environments.get(prev).state;
                if prev_state != EnvState::Complete {
                    errors.push(format!("Environment {} requires {} to be complete", env, prev));
                }
            }
        }
        _ => {}
    }

    ValidationOutcome { errors }
}

/// Human-readable next actions for an environment, keyed by its current state
pub fn next_actions(env: &Environment, _thread: &ClientThread) -> Vec<String> {
    let mut actions = Vec::new();

    match env.state {
        EnvState::NotStarted => {
            actions.push("Create NSSR/OAuth ticket".to_string());
            if env.kind.uses_lanids() {
                actions.push("Create GLAM/GWAM tickets".to_string());
            }
            actions.push("Generate redirect URIs".to_string());
        }
        EnvState::FormsRaised => {
            actions.push("Wait for credentials to be issued".to_string());
        }
        EnvState::CredsIssued => {
            if env.kind.uses_lanids() {
                actions.push("Create GLAM/GWAM tickets".to_string());
            }
            actions.push("Test application sign-in".to_string());
        }
        EnvState::AccessProvisioned => {
            let missing = env.evidence.missing_screenshot_labels();
            if missing.is_empty() {
                actions.push("Advance to Validated with captured screenshots".to_string());
            } else {
                for label in missing {
                    actions.push(format!("Capture {} screenshot", label));
                }
            }
        }
        EnvState::Validated => {
            actions.push("Send sign-off email with screenshots and redirect URIs".to_string());
        }
        EnvState::SignoffSent => {
            actions.push("Wait for approval email".to_string());
        }
        EnvState::Approved => {
            if env.kind == EnvKind::Prod {
                actions.push("Production ready - onboarding complete".to_string());
            } else {
                actions.push("Proceed to next environment".to_string());
            }
        }
        EnvState::Blocked => {
            actions.push("Resolve blocker and retry".to_string());
        }
        EnvState::ChangesRequested => {
            actions.push("Address requested changes".to_string());
        }
        EnvState::Complete | EnvState::Abandoned => {}
    }

    actions
}

/// Diagnostic blockers for an environment. Not an exhaustive audit, only the
/// signals a human would act on.
pub fn blockers(env: &Environment, _thread: &ClientThread) -> Vec<String> {
    let mut blockers = Vec::new();

    match env.state {
        EnvState::Blocked => {
            blockers.push("Environment is blocked - manual intervention required".to_string());
        }
        EnvState::ChangesRequested => {
            blockers.push("Changes requested - address feedback before proceeding".to_string());
        }
        EnvState::FormsRaised => {
            for ticket in &env.evidence.tickets {
                if ticket.is_open() {
                    blockers.push(format!("Ticket {} ({}) is still open", ticket.id, ticket.kind));
                }
            }
        }
        EnvState::SignoffSent => {
            if env.evidence.emails.is_empty() {
                blockers.push("Waiting for sign-off approval".to_string());
            }
        }
        _ => {}
    }

    blockers
}

/// Overall progress across all three environments, in [0.0, 1.0].
///
/// Each ordered state scores its index + 1 (Complete scores the full
/// progression length); special states score zero while still counting
/// toward the denominator.
pub fn calculate_progress(thread: &ClientThread) -> f64 {
    let total_states = STATE_ORDER.len();
    let mut completed: usize = 0;

    for env in thread.environments.iter() {
        if env.state == EnvState::Complete {
            completed += total_states;
        } else if let Some(idx) = order_index(env.state) {
            completed += idx + 1;
        }
    }

    let max_possible = total_states * EnvKind::ALL.len();
    (completed as f64 / max_possible as f64).min(1.0)
}

/// The environment currently being worked on: the first of dev, staging, prod
/// that is neither Complete nor Abandoned. None once all are terminal.
pub fn current_environment(thread: &ClientThread) -> Option<EnvKind> {
    EnvKind::ALL.into_iter().find(|kind| {
        let state = thread.environments.get(*kind).state;
        state != EnvState::Complete && state != EnvState::Abandoned
    })
}
