//! Property tests for the connection state machine.
//!
//! Invariants tested:
//! - Only legal edges change the state
//! - Closed is absorbing
//! - Reconnecting is unreachable without a policy
//! - Every successful transition is reported exactly once, in order

use hublink_reconnect::{ConnectionEvent, ConnectionState, ConnectionStateMachine, FnListener};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

fn any_state() -> impl Strategy<Value = ConnectionState> {
    prop_oneof![
        Just(ConnectionState::Connecting),
        Just(ConnectionState::Connected),
        Just(ConnectionState::Disconnected),
        Just(ConnectionState::Reconnecting),
        Just(ConnectionState::Closed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: a random request sequence only ever follows legal edges
    #[test]
    fn random_requests_follow_legal_edges(
        reconnect_enabled in any::<bool>(),
        requests in prop::collection::vec(any_state(), 0..40),
    ) {
        let machine = ConnectionStateMachine::new("prop", reconnect_enabled);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        machine.subscribe(FnListener::new(move |event: &ConnectionEvent| {
            if let ConnectionEvent::StateTransition { from_state, to_state, .. } = event {
                s.lock().push((*from_state, *to_state));
            }
        }));

        let mut expected = Vec::new();
        let mut current = ConnectionState::Connecting;
        for to in requests {
            let legal = current.can_transition_to(to, reconnect_enabled);
            let result = machine.transition(to);
            prop_assert_eq!(result.is_ok(), legal);
            if legal {
                expected.push((current, to));
                current = to;
            }
            prop_assert_eq!(machine.state(), current);
            if !reconnect_enabled {
                prop_assert_ne!(machine.state(), ConnectionState::Reconnecting);
            }
        }

        prop_assert_eq!(&*seen.lock(), &expected);
    }

    /// Property: once Closed, nothing leaves Closed
    #[test]
    fn closed_is_absorbing(
        requests in prop::collection::vec(any_state(), 1..20),
    ) {
        let machine = ConnectionStateMachine::new("prop", true);
        prop_assert!(machine.close());

        for to in requests {
            prop_assert!(machine.transition(to).is_err());
            prop_assert_eq!(machine.state(), ConnectionState::Closed);
        }
        prop_assert!(!machine.close());
    }
}
