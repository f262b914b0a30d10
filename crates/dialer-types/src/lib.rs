//! Shared types and constants for the dialer.
//!
//! This crate provides the small vocabulary every other crate in the
//! workspace agrees on: the outcome classification of a call attempt, its
//! direction, and the phone-number helpers used by both the browser-side
//! controller and the server-side signaling handler.
//!
//! No crate in the workspace depends on anything *except* `dialer-types` for
//! cross-cutting type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod phone;

pub use phone::{
    compose_destination, is_dialable, normalize_digits, split_country_code, CountryPrefix,
    DestinationError, COUNTRY_PREFIXES,
};

/// Outcome classification of a finished call attempt.
///
/// Stored as a lowercase string in the `call_logs.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// The remote party answered and the call lasted at least one second.
    Completed,
    /// The call never reached the connected state.
    NoAnswer,
    /// The provider explicitly reported the remote line as busy.
    Busy,
    /// The provider explicitly reported a failure.
    Failed,
}

impl CallStatus {
    /// Returns the database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl FromStr for CallStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "no_answer" => Ok(Self::NoAnswer),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError {
                kind: "call status",
                value: other.to_string(),
            }),
        }
    }
}

/// Direction of a call relative to the seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    /// Placed by the seller from the browser.
    #[default]
    Outbound,
    /// Received by the seller. Only ever stored, never handled.
    Inbound,
}

impl CallDirection {
    /// Returns the database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbound" => Ok(Self::Outbound),
            "inbound" => Ok(Self::Inbound),
            other => Err(ParseEnumError {
                kind: "call direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Classifies a finished call attempt.
///
/// Any positive duration means the call was answered. Otherwise an explicit
/// provider signal (`busy` or `failed`) wins over the `no_answer` default.
pub fn classify_outcome(duration_seconds: u64, provider_signal: Option<CallStatus>) -> CallStatus {
    if duration_seconds > 0 {
        return CallStatus::Completed;
    }
    match provider_signal {
        Some(CallStatus::Busy) => CallStatus::Busy,
        Some(CallStatus::Failed) => CallStatus::Failed,
        _ => CallStatus::NoAnswer,
    }
}

/// What the browser-side controller reports once a call attempt has ended.
///
/// The seller is not part of the report; the server takes it from the
/// authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReport {
    /// Identifier of the call attempt, generated when the dial starts.
    pub attempt_id: String,
    pub phone_number: String,
    pub country_code: String,
    pub duration_seconds: u64,
    #[serde(default)]
    pub direction: CallDirection,
    pub status: CallStatus,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub provider_call_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_status_round_trip() {
        for status in [
            CallStatus::Completed,
            CallStatus::NoAnswer,
            CallStatus::Busy,
            CallStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<CallStatus>(), Ok(status));
        }
    }

    #[test]
    fn call_status_rejects_unknown() {
        let err = "ringing".parse::<CallStatus>().unwrap_err();
        assert_eq!(err.value, "ringing");
    }

    #[test]
    fn call_status_serializes_snake_case() {
        let json = serde_json::to_string(&CallStatus::NoAnswer).unwrap();
        assert_eq!(json, "\"no_answer\"");
    }

    #[test]
    fn answered_call_is_completed_even_if_busy_was_signaled() {
        assert_eq!(
            classify_outcome(12, Some(CallStatus::Busy)),
            CallStatus::Completed
        );
    }

    #[test]
    fn unanswered_call_defaults_to_no_answer() {
        assert_eq!(classify_outcome(0, None), CallStatus::NoAnswer);
        assert_eq!(
            classify_outcome(0, Some(CallStatus::Completed)),
            CallStatus::NoAnswer
        );
    }

    #[test]
    fn call_report_defaults_optional_fields() {
        let report: CallReport = serde_json::from_str(
            r#"{"attempt_id":"a1","phone_number":"12345678","country_code":"45",
                "duration_seconds":0,"status":"no_answer"}"#,
        )
        .unwrap();
        assert_eq!(report.direction, CallDirection::Outbound);
        assert_eq!(report.lead_id, None);
        assert_eq!(report.provider_call_id, None);
    }

    #[test]
    fn explicit_provider_signal_is_kept_for_unanswered_calls() {
        assert_eq!(classify_outcome(0, Some(CallStatus::Busy)), CallStatus::Busy);
        assert_eq!(
            classify_outcome(0, Some(CallStatus::Failed)),
            CallStatus::Failed
        );
    }
}
