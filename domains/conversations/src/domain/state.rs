//! State machine for a single send-message run
//!
//! Send states: Idle → Composing → AwaitingReply → {Settled | Failed}

pub use aidline_common::StateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    Idle,
    Composing,
    AwaitingReply,
    Settled,
    Failed,
}

impl SendState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [SendState] {
        match self {
            Self::Idle => &[Self::Composing],
            Self::Composing => &[Self::AwaitingReply],
            Self::AwaitingReply => &[Self::Settled, Self::Failed],
            Self::Settled | Self::Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }
}

impl std::fmt::Display for SendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Composing => write!(f, "composing"),
            Self::AwaitingReply => write!(f, "awaiting_reply"),
            Self::Settled => write!(f, "settled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive a send run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SendEvent {
    /// User and placeholder messages are being built
    Compose,
    /// Both messages were appended and the gateway call is in flight
    Dispatch,
    ReplyReceived,
    ReplyFailed,
}

impl std::fmt::Display for SendEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compose => write!(f, "compose"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::ReplyReceived => write!(f, "reply_received"),
            Self::ReplyFailed => write!(f, "reply_failed"),
        }
    }
}

pub struct SendStateMachine;

impl SendStateMachine {
    /// Attempt a state transition
    pub fn transition(current: SendState, event: SendEvent) -> Result<SendState, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match (current, event) {
            (SendState::Idle, SendEvent::Compose) => SendState::Composing,
            (SendState::Composing, SendEvent::Dispatch) => SendState::AwaitingReply,
            (SendState::AwaitingReply, SendEvent::ReplyReceived) => SendState::Settled,
            (SendState::AwaitingReply, SendEvent::ReplyFailed) => SendState::Failed,
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        tracing::debug!(from = %current, to = %next, event = %event, "Send state transition");
        Ok(next)
    }
}
