//! Persistence operations for the `call_logs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use dialer_types::{CallDirection, CallReport, CallStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::CallLogError;

/// Upper bound for [`list_for_seller`].
pub const MAX_LIST_LIMIT: u32 = 200;

const SELECT_COLUMNS: &str = "id, attempt_id, seller_id, phone_number, country_code,
    duration_seconds, direction, status, lead_id, provider_call_id, recording_url,
    recording_sid, transcript, transcribed_at, created_at";

/// The base row written once a call attempt has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCallLog {
    /// Client-generated identifier of the call attempt.
    pub attempt_id: String,
    pub seller_id: String,
    pub phone_number: String,
    pub country_code: String,
    pub duration_seconds: u64,
    #[serde(default)]
    pub direction: CallDirection,
    pub status: CallStatus,
    #[serde(default)]
    pub lead_id: Option<String>,
    /// Absent when the call never reached the provider's accept event.
    #[serde(default)]
    pub provider_call_id: Option<String>,
}

impl NewCallLog {
    /// Attributes a controller report to the authenticated seller.
    pub fn from_report(seller_id: impl Into<String>, report: CallReport) -> Self {
        Self {
            attempt_id: report.attempt_id,
            seller_id: seller_id.into(),
            phone_number: report.phone_number,
            country_code: report.country_code,
            duration_seconds: report.duration_seconds,
            direction: report.direction,
            status: report.status,
            lead_id: report.lead_id,
            provider_call_id: report.provider_call_id,
        }
    }
}

/// A persisted call log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLogRecord {
    pub id: i64,
    pub attempt_id: String,
    pub seller_id: String,
    pub phone_number: String,
    pub country_code: String,
    pub duration_seconds: u64,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub lead_id: Option<String>,
    pub provider_call_id: Option<String>,
    pub recording_url: Option<String>,
    pub recording_sid: Option<String>,
    pub transcript: Option<String>,
    pub transcribed_at: Option<String>,
    pub created_at: String,
}

/// Result of an enrichment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// The row existed and at least one column changed.
    Applied,
    /// The row existed and already held these values.
    Unchanged,
    /// No row carries this provider call id (yet).
    NoMatchingRow,
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = dialer_types::ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CallLogRecord> {
    let duration: i64 = row.get(5)?;
    Ok(CallLogRecord {
        id: row.get(0)?,
        attempt_id: row.get(1)?,
        seller_id: row.get(2)?,
        phone_number: row.get(3)?,
        country_code: row.get(4)?,
        duration_seconds: duration.max(0) as u64,
        direction: parse_column(row, 6)?,
        status: parse_column(row, 7)?,
        lead_id: row.get(8)?,
        provider_call_id: row.get(9)?,
        recording_url: row.get(10)?,
        recording_sid: row.get(11)?,
        transcript: row.get(12)?,
        transcribed_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CallLogError> {
    if value.trim().is_empty() {
        return Err(CallLogError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Writes the base row for a call attempt.
///
/// Insert-or-ignore on `attempt_id`: a retried write for the same attempt
/// returns the row stored by the first one instead of creating another.
///
/// # Errors
///
/// Returns `CallLogError::Invalid` for empty identifiers or phone number and
/// `CallLogError::Database` on SQL failure.
pub fn create_call_log(conn: &Connection, new: &NewCallLog) -> Result<CallLogRecord, CallLogError> {
    require_non_empty("attempt_id", &new.attempt_id)?;
    require_non_empty("seller_id", &new.seller_id)?;
    require_non_empty("phone_number", &new.phone_number)?;

    let duration = i64::try_from(new.duration_seconds)
        .map_err(|_| CallLogError::Invalid("duration_seconds out of range".to_string()))?;
    let provider_call_id = new
        .provider_call_id
        .as_deref()
        .filter(|id| !id.trim().is_empty());

    let inserted = conn.execute(
        "INSERT INTO call_logs
            (attempt_id, seller_id, phone_number, country_code, duration_seconds,
             direction, status, lead_id, provider_call_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(attempt_id) DO NOTHING",
        params![
            new.attempt_id,
            new.seller_id,
            new.phone_number,
            new.country_code,
            duration,
            new.direction.as_str(),
            new.status.as_str(),
            new.lead_id,
            provider_call_id,
        ],
    )
    .map_err(|e| match e {
        // attempt_id conflicts are absorbed above; only provider_call_id remains.
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            CallLogError::Invalid(format!(
                "provider_call_id {} is already logged for another attempt",
                provider_call_id.unwrap_or_default()
            ))
        }
        other => CallLogError::Database(other),
    })?;

    if inserted == 0 {
        tracing::debug!(attempt_id = %new.attempt_id, "call log already written for attempt");
    }

    get_by_attempt_id(conn, &new.attempt_id)?
        .ok_or(CallLogError::Database(rusqlite::Error::QueryReturnedNoRows))
}

/// Attaches a finished recording to the call identified by `provider_call_id`.
///
/// # Errors
///
/// Returns `CallLogError::Invalid` for empty arguments and
/// `CallLogError::Database` on SQL failure.
pub fn attach_recording(
    conn: &Connection,
    provider_call_id: &str,
    recording_url: &str,
    recording_sid: &str,
) -> Result<EnrichOutcome, CallLogError> {
    require_non_empty("provider_call_id", provider_call_id)?;
    require_non_empty("recording_url", recording_url)?;
    require_non_empty("recording_sid", recording_sid)?;

    let changed = conn.execute(
        "UPDATE call_logs
         SET recording_url = ?2, recording_sid = ?3
         WHERE provider_call_id = ?1
           AND (recording_url IS NOT ?2 OR recording_sid IS NOT ?3)",
        params![provider_call_id, recording_url, recording_sid],
    )?;

    outcome(conn, provider_call_id, changed)
}

/// Attaches a transcript to the call identified by `provider_call_id`.
///
/// `transcribed_at` is only rewritten when the transcript text changes, so
/// repeating the same transcription leaves the row untouched.
///
/// # Errors
///
/// Returns `CallLogError::Invalid` for an empty transcript and
/// `CallLogError::Database` on SQL failure.
pub fn attach_transcript(
    conn: &Connection,
    provider_call_id: &str,
    transcript: &str,
    transcribed_at: DateTime<Utc>,
) -> Result<EnrichOutcome, CallLogError> {
    require_non_empty("provider_call_id", provider_call_id)?;
    require_non_empty("transcript", transcript)?;

    let changed = conn.execute(
        "UPDATE call_logs
         SET transcript = ?2, transcribed_at = ?3
         WHERE provider_call_id = ?1 AND transcript IS NOT ?2",
        params![
            provider_call_id,
            transcript,
            transcribed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ],
    )?;

    outcome(conn, provider_call_id, changed)
}

fn outcome(
    conn: &Connection,
    provider_call_id: &str,
    changed: usize,
) -> Result<EnrichOutcome, CallLogError> {
    if changed > 0 {
        return Ok(EnrichOutcome::Applied);
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM call_logs WHERE provider_call_id = ?1)",
        params![provider_call_id],
        |row| row.get(0),
    )?;
    Ok(if exists {
        EnrichOutcome::Unchanged
    } else {
        EnrichOutcome::NoMatchingRow
    })
}

/// Fetches the row for a call attempt.
///
/// # Errors
///
/// Returns `CallLogError::Database` on SQL failure.
pub fn get_by_attempt_id(
    conn: &Connection,
    attempt_id: &str,
) -> Result<Option<CallLogRecord>, CallLogError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM call_logs WHERE attempt_id = ?1"),
        params![attempt_id],
        row_to_record,
    )
    .optional()
    .map_err(CallLogError::from)
}

/// Fetches the row carrying a provider call id.
///
/// # Errors
///
/// Returns `CallLogError::Database` on SQL failure.
pub fn get_by_provider_call_id(
    conn: &Connection,
    provider_call_id: &str,
) -> Result<Option<CallLogRecord>, CallLogError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM call_logs WHERE provider_call_id = ?1"),
        params![provider_call_id],
        row_to_record,
    )
    .optional()
    .map_err(CallLogError::from)
}

/// Lists a seller's most recent call attempts, newest first.
///
/// `limit` is clamped to `1..=MAX_LIST_LIMIT`.
///
/// # Errors
///
/// Returns `CallLogError::Database` on SQL failure.
pub fn list_for_seller(
    conn: &Connection,
    seller_id: &str,
    limit: u32,
) -> Result<Vec<CallLogRecord>, CallLogError> {
    let limit = limit.clamp(1, MAX_LIST_LIMIT);
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM call_logs
         WHERE seller_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    ))?;

    let rows = stmt.query_map(params![seller_id, limit], row_to_record)?;
    let records = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
