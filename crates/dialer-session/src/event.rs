//! Inputs to the call controller and the table mapping provider events to
//! state transitions.

use crate::error::SessionError;
use crate::state::CallState;
use dialer_types::CallStatus;

/// Events raised by the signaling provider's device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The device finished registering with the current token.
    Registered,
    /// Outbound ringing on the remote side.
    Ringing,
    /// The remote party answered. The call id may only be known from here on.
    Accepted { call_sid: String },
    /// The active call was torn down by either side.
    Disconnected,
    /// The remote party rejected the call.
    Rejected,
    /// The remote line is busy.
    Busy,
    /// The provider could not complete the call.
    Failed,
    /// The outbound attempt was cancelled before it was answered.
    Cancelled,
    /// The current access token is about to expire.
    TokenWillExpire,
    /// Device or signaling failure.
    Error { message: String },
    /// An inbound call was offered.
    Incoming { call_sid: Option<String> },
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Ringing => "ringing",
            Self::Accepted { .. } => "accepted",
            Self::Disconnected => "disconnected",
            Self::Rejected => "rejected",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TokenWillExpire => "token_will_expire",
            Self::Error { .. } => "error",
            Self::Incoming { .. } => "incoming",
        }
    }
}

/// User actions issued through the controller handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// First use: fetch a token and register.
    Initialize,
    /// Leave `error` by re-entering `initializing`.
    Retry,
    Dial {
        number: String,
        country_code: String,
        lead_id: Option<String>,
    },
    Hangup,
    SetMuted(bool),
}

/// Why a token was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Register,
    Refresh,
}

/// Everything the controller task consumes, on a single channel.
#[derive(Debug)]
pub(crate) enum Input {
    Command(Command),
    Provider(ProviderEvent),
    TokenFetched {
        purpose: TokenPurpose,
        result: Result<String, SessionError>,
    },
    Shutdown,
}

/// The effect a provider event has in a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `initializing → ready`.
    Registered,
    /// `connecting → ringing`.
    Ringing,
    /// `connecting | ringing → connected`.
    Answered { call_sid: String },
    /// Into `ended`, carrying any explicit provider outcome.
    End { signal: Option<CallStatus> },
    /// End any call in flight, then `error`.
    Fail { message: String },
    /// Turn down an inbound offer without changing state.
    RejectIncoming { call_sid: Option<String> },
    /// Fetch a new token and swap it into the device.
    RefreshToken,
    /// The event has no effect in this state.
    Ignore,
}

/// Looks up the transition for `event` in `state`.
pub fn transition(state: CallState, event: &ProviderEvent) -> Transition {
    use CallState as S;
    use ProviderEvent as E;

    match (state, event) {
        (S::Initializing, E::Registered) => Transition::Registered,
        (S::Connecting, E::Ringing) => Transition::Ringing,
        (S::Connecting | S::Ringing, E::Accepted { call_sid }) => Transition::Answered {
            call_sid: call_sid.clone(),
        },
        (s, E::Disconnected | E::Rejected | E::Cancelled) if s.is_in_call() => {
            Transition::End { signal: None }
        }
        (s, E::Busy) if s.is_in_call() => Transition::End {
            signal: Some(CallStatus::Busy),
        },
        (s, E::Failed) if s.is_in_call() => Transition::End {
            signal: Some(CallStatus::Failed),
        },
        (S::Idle, E::Error { .. }) => Transition::Ignore,
        (_, E::Error { message }) => Transition::Fail {
            message: message.clone(),
        },
        (_, E::Incoming { call_sid }) => Transition::RejectIncoming {
            call_sid: call_sid.clone(),
        },
        (S::Idle, E::TokenWillExpire) => Transition::Ignore,
        (_, E::TokenWillExpire) => Transition::RefreshToken,
        _ => Transition::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert_eq!(
            transition(CallState::Initializing, &ProviderEvent::Registered),
            Transition::Registered
        );
        assert_eq!(
            transition(CallState::Connecting, &ProviderEvent::Ringing),
            Transition::Ringing
        );
        assert_eq!(
            transition(
                CallState::Ringing,
                &ProviderEvent::Accepted {
                    call_sid: "CA123".into()
                }
            ),
            Transition::Answered {
                call_sid: "CA123".into()
            }
        );
    }

    #[test]
    fn accept_without_ringing_is_allowed() {
        assert!(matches!(
            transition(
                CallState::Connecting,
                &ProviderEvent::Accepted {
                    call_sid: "CA1".into()
                }
            ),
            Transition::Answered { .. }
        ));
    }

    #[test]
    fn termination_only_applies_in_call() {
        for state in [CallState::Connecting, CallState::Ringing, CallState::Connected] {
            assert_eq!(
                transition(state, &ProviderEvent::Disconnected),
                Transition::End { signal: None }
            );
            assert_eq!(
                transition(state, &ProviderEvent::Busy),
                Transition::End {
                    signal: Some(CallStatus::Busy)
                }
            );
        }
        for state in [CallState::Ended, CallState::Ready, CallState::Idle] {
            assert_eq!(
                transition(state, &ProviderEvent::Disconnected),
                Transition::Ignore
            );
            assert_eq!(transition(state, &ProviderEvent::Failed), Transition::Ignore);
        }
    }

    #[test]
    fn late_events_after_end_are_ignored() {
        assert_eq!(
            transition(
                CallState::Ended,
                &ProviderEvent::Accepted {
                    call_sid: "CA9".into()
                }
            ),
            Transition::Ignore
        );
        assert_eq!(
            transition(CallState::Ready, &ProviderEvent::Ringing),
            Transition::Ignore
        );
    }

    #[test]
    fn inbound_offers_are_rejected_in_every_state() {
        for state in [CallState::Ready, CallState::Connected, CallState::Error] {
            assert!(matches!(
                transition(state, &ProviderEvent::Incoming { call_sid: None }),
                Transition::RejectIncoming { .. }
            ));
        }
    }

    #[test]
    fn token_expiry_refreshes_unless_idle() {
        assert_eq!(
            transition(CallState::Connected, &ProviderEvent::TokenWillExpire),
            Transition::RefreshToken
        );
        assert_eq!(
            transition(CallState::Idle, &ProviderEvent::TokenWillExpire),
            Transition::Ignore
        );
    }
}
