// ABOUTME: SMPP session state machine for an ESME transceiver
// ABOUTME: Pure transition table from (state, event) to the next state and the effects to perform

use crate::datatypes::CommandStatus;
use std::fmt;

/// SMPP v3.4 session states (Section 2.2) as seen by a transceiver ESME.
///
/// ```text
/// CLOSED → OPEN → BOUND → UNBINDING → CLOSED
/// ```
///
/// - **Closed**: no TCP connection exists
/// - **Open**: TCP connection established, bind_transceiver sent, no response yet
/// - **Bound**: bind accepted; submit_sm and deliver_sm traffic may flow
/// - **Unbinding**: unbind sent or received, session terminating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Open,
    Bound,
    Unbinding,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "CLOSED",
            SessionState::Open => "OPEN",
            SessionState::Bound => "BOUND",
            SessionState::Unbinding => "UNBINDING",
        };
        f.write_str(name)
    }
}

/// Things that happen to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// TCP connection established
    Connected,
    /// bind_transceiver_resp with ESME_ROK
    BindSucceeded,
    /// bind_transceiver_resp (or generic_nack) with an error status
    BindRejected(CommandStatus),
    BindTimedOut,
    /// The local operator asked to unbind
    UnbindRequested,
    /// The SMSC sent unbind
    PeerUnbind { sequence_number: u32 },
    /// unbind_resp arrived for our unbind
    UnbindCompleted,
    KeepaliveExpired,
    /// The transport went away
    Disconnected,
}

/// Side effects the session performs after a transition, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SendBind,
    StartBindTimer,
    CancelBindTimer,
    StartKeepalive,
    StopKeepalive,
    SendUnbind,
    AcknowledgeUnbind(u32),
    CloseConnection,
    /// Fail every outstanding request with a connection-lost error
    FailPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
    /// False when the event is not valid in the current state; the state is
    /// unchanged and there are no effects.
    pub accepted: bool,
}

impl Transition {
    fn to(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            accepted: true,
        }
    }

    fn rejected(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            accepted: false,
        }
    }
}

impl SessionState {
    /// Computes the transition for `event`. No I/O happens here.
    pub fn on_event(&self, event: &SessionEvent) -> Transition {
        use Effect::*;
        use SessionEvent as E;
        use SessionState::*;

        match (*self, event) {
            (Closed, E::Connected) => Transition::to(Open, vec![SendBind, StartBindTimer]),

            (Open, E::BindSucceeded) => {
                Transition::to(Bound, vec![CancelBindTimer, StartKeepalive])
            }
            (Open, E::BindRejected(_)) => {
                Transition::to(Closed, vec![CancelBindTimer, CloseConnection])
            }
            (Open, E::BindTimedOut) => Transition::to(Closed, vec![CloseConnection]),
            (Open, E::UnbindRequested) => {
                Transition::to(Closed, vec![CancelBindTimer, CloseConnection])
            }

            (Bound, E::UnbindRequested) => {
                Transition::to(Unbinding, vec![StopKeepalive, SendUnbind])
            }
            (Unbinding, E::UnbindCompleted) => Transition::to(Closed, vec![CloseConnection]),

            (Open, E::PeerUnbind { sequence_number }) => Transition::to(
                Unbinding,
                vec![
                    CancelBindTimer,
                    AcknowledgeUnbind(*sequence_number),
                    CloseConnection,
                ],
            ),
            (Bound, E::PeerUnbind { sequence_number }) => Transition::to(
                Unbinding,
                vec![
                    StopKeepalive,
                    AcknowledgeUnbind(*sequence_number),
                    CloseConnection,
                ],
            ),
            // Both sides unbinding at once
            (Unbinding, E::PeerUnbind { sequence_number }) => Transition::to(
                Unbinding,
                vec![AcknowledgeUnbind(*sequence_number), CloseConnection],
            ),

            (Bound, E::KeepaliveExpired) => {
                Transition::to(Closed, vec![StopKeepalive, FailPending, CloseConnection])
            }

            (Open | Bound | Unbinding, E::Disconnected) => {
                Transition::to(Closed, vec![CancelBindTimer, StopKeepalive, FailPending])
            }

            (state, _) => Transition::rejected(state),
        }
    }

    /// Only a bound session carries submit_sm and deliver_sm traffic.
    pub fn is_bound(&self) -> bool {
        matches!(self, SessionState::Bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent as E;

    #[test]
    fn connect_sends_bind() {
        let transition = SessionState::Closed.on_event(&E::Connected);
        assert_eq!(transition.state, SessionState::Open);
        assert_eq!(transition.effects, vec![Effect::SendBind, Effect::StartBindTimer]);
    }

    #[test]
    fn bind_success_starts_keepalive() {
        let transition = SessionState::Open.on_event(&E::BindSucceeded);
        assert_eq!(transition.state, SessionState::Bound);
        assert!(transition.effects.contains(&Effect::CancelBindTimer));
        assert!(transition.effects.contains(&Effect::StartKeepalive));
    }

    #[test]
    fn bind_failure_closes_without_binding() {
        for event in [E::BindRejected(CommandStatus::InvalidPassword), E::BindTimedOut] {
            let transition = SessionState::Open.on_event(&event);
            assert_eq!(transition.state, SessionState::Closed);
            assert!(transition.effects.contains(&Effect::CloseConnection));
            assert!(!transition.effects.contains(&Effect::StartKeepalive));
        }
    }

    #[test]
    fn operator_unbind_from_bound() {
        let transition = SessionState::Bound.on_event(&E::UnbindRequested);
        assert_eq!(transition.state, SessionState::Unbinding);
        assert_eq!(transition.effects, vec![Effect::StopKeepalive, Effect::SendUnbind]);

        let transition = SessionState::Unbinding.on_event(&E::UnbindCompleted);
        assert_eq!(transition.state, SessionState::Closed);
    }

    #[test]
    fn peer_unbind_is_acknowledged() {
        let transition = SessionState::Bound.on_event(&E::PeerUnbind { sequence_number: 9 });
        assert_eq!(transition.state, SessionState::Unbinding);
        assert!(transition.effects.contains(&Effect::AcknowledgeUnbind(9)));
        assert!(transition.effects.contains(&Effect::CloseConnection));
    }

    #[test]
    fn disconnect_from_any_live_state_fails_pending() {
        for state in [SessionState::Open, SessionState::Bound, SessionState::Unbinding] {
            let transition = state.on_event(&E::Disconnected);
            assert_eq!(transition.state, SessionState::Closed);
            assert!(transition.effects.contains(&Effect::FailPending));
        }
    }

    #[test]
    fn keepalive_expiry_closes_bound_session() {
        let transition = SessionState::Bound.on_event(&E::KeepaliveExpired);
        assert_eq!(transition.state, SessionState::Closed);
        assert!(transition.effects.contains(&Effect::FailPending));
    }

    #[test]
    fn invalid_events_are_rejected() {
        let transition = SessionState::Closed.on_event(&E::BindSucceeded);
        assert!(!transition.accepted);
        assert_eq!(transition.state, SessionState::Closed);
        assert!(transition.effects.is_empty());

        assert!(!SessionState::Bound.on_event(&E::BindSucceeded).accepted);
        assert!(!SessionState::Closed.on_event(&E::Disconnected).accepted);
        assert!(!SessionState::Open.on_event(&E::KeepaliveExpired).accepted);
    }
}
