//! Property tests for the transition rules
//!
//! The adjacency and special-state rules must hold for every state pair, not
//! just the ones the unit tests happen to pick.

use proptest::prelude::*;

use onramp::onboarding::{
    can_transition, state_machine::order_index, EnvState, SPECIAL_STATES, STATE_ORDER,
};

fn any_state() -> impl Strategy<Value = EnvState> {
    prop::sample::select(
        STATE_ORDER
            .iter()
            .chain(SPECIAL_STATES.iter())
            .copied()
            .collect::<Vec<_>>(),
    )
}

fn ordered_state() -> impl Strategy<Value = EnvState> {
    prop::sample::select(STATE_ORDER.to_vec())
}

proptest! {
    /// Every ordered state advances to its immediate successor and nowhere
    /// else within the progression
    #[test]
    fn next_in_order_is_the_only_legal_advance(current in ordered_state(), target in ordered_state()) {
        let current_idx = order_index(current).unwrap();
        let target_idx = order_index(target).unwrap();
        let legal = can_transition(current, target, None);
        prop_assert_eq!(legal, target_idx == current_idx + 1);
    }

    /// Special states are enterable from absolutely anywhere
    #[test]
    fn special_states_always_enterable(current in any_state()) {
        for special in SPECIAL_STATES {
            prop_assert!(can_transition(current, special, None));
        }
    }

    /// Skipping a state is never legal
    #[test]
    fn skipping_states_is_rejected(start in 0usize..6) {
        let current = STATE_ORDER[start];
        for target in STATE_ORDER.iter().skip(start + 2) {
            prop_assert!(!can_transition(current, *target, None));
        }
    }

    /// Backward moves are only reachable through ChangesRequested
    #[test]
    fn ordered_states_never_move_backward(current in ordered_state(), target in ordered_state()) {
        let current_idx = order_index(current).unwrap();
        let target_idx = order_index(target).unwrap();
        if target_idx <= current_idx {
            prop_assert!(!can_transition(current, target, None));
        }
    }

    /// With a recorded origin, rollback stays strictly before it
    #[test]
    fn rollback_is_bounded_by_origin(origin in ordered_state(), target in ordered_state()) {
        let origin_idx = order_index(origin).unwrap();
        let target_idx = order_index(target).unwrap();
        let legal = can_transition(EnvState::ChangesRequested, target, Some(origin));
        prop_assert_eq!(legal, target_idx < origin_idx);
    }
}
