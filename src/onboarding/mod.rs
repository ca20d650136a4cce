// Onboarding Domain Module - Evidence-Gated State Machine
//
// This module holds the typed data model for client onboarding threads and the
// pure decision core that rules on environment state transitions.

pub mod evidence;
pub mod state_machine;
pub mod types;


pub use evidence::{Evidence, ScreenshotLabel, ScreenshotRef, SecretRef, TicketKind, TicketRef};
pub use state_machine::{
    blockers, calculate_progress, can_transition, current_environment, next_actions,
    validate_transition, ValidationOutcome, SPECIAL_STATES, STATE_ORDER,
};
pub use types::{
    ClientThread, EnvKind, EnvState, Environment, Environments, PeopleSet, RedirectUris,
};
