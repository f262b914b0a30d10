use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the browser phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Initializing,
    Ready,
    Connecting,
    Ringing,
    Connected,
    Ended,
    Error,
}

impl CallState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Connecting => "connecting",
            Self::Ringing => "ringing",
            Self::Connected => "connected",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// States in which a call attempt is in flight.
    pub fn is_in_call(self) -> bool {
        matches!(self, Self::Connecting | Self::Ringing | Self::Connected)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    pub state: CallState,
    /// Whole seconds since the call was answered; 0 outside a connected call.
    pub elapsed_seconds: u64,
    pub muted: bool,
    /// Last user-visible message, e.g. why a dial was refused.
    pub message: Option<String>,
}
