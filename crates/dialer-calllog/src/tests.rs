//! Unit tests for the call log store.

use chrono::{TimeZone, Utc};
use dialer_types::{CallDirection, CallStatus};
use rusqlite::Connection;

use crate::error::CallLogError;
use crate::store::{
    attach_recording, attach_transcript, create_call_log, get_by_provider_call_id,
    list_for_seller, EnrichOutcome, NewCallLog,
};

/// Creates an in-memory SQLite database with migrations applied.
fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    dialer_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn answered_call(attempt_id: &str, call_sid: &str) -> NewCallLog {
    NewCallLog {
        attempt_id: attempt_id.to_string(),
        seller_id: "seller-7".to_string(),
        phone_number: "+4512345678".to_string(),
        country_code: "45".to_string(),
        duration_seconds: 5,
        direction: CallDirection::Outbound,
        status: CallStatus::Completed,
        lead_id: Some("lead-99".to_string()),
        provider_call_id: Some(call_sid.to_string()),
    }
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM call_logs", [], |row| row.get(0))
        .expect("should count rows")
}

// ── create_call_log ──────────────────────────────────────────────────

#[test]
fn create_stores_base_row_without_enrichment() {
    let conn = test_db();
    let record = create_call_log(&conn, &answered_call("attempt-1", "CA123"))
        .expect("create should succeed");

    assert!(record.id > 0);
    assert_eq!(record.duration_seconds, 5);
    assert_eq!(record.status, CallStatus::Completed);
    assert_eq!(record.direction, CallDirection::Outbound);
    assert_eq!(record.provider_call_id.as_deref(), Some("CA123"));
    assert_eq!(record.lead_id.as_deref(), Some("lead-99"));
    assert!(record.recording_url.is_none());
    assert!(record.recording_sid.is_none());
    assert!(record.transcript.is_none());
    assert!(record.transcribed_at.is_none());
    assert!(!record.created_at.is_empty());
}

#[test]
fn create_is_insert_or_ignore_per_attempt() {
    let conn = test_db();
    let first = create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();

    let mut retry = answered_call("attempt-1", "CA123");
    retry.duration_seconds = 99;
    let second = create_call_log(&conn, &retry).unwrap();

    assert_eq!(first, second, "retry returns the original row");
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn create_treats_blank_provider_id_as_absent() {
    let conn = test_db();
    let mut unanswered = answered_call("attempt-2", "");
    unanswered.duration_seconds = 0;
    unanswered.status = CallStatus::NoAnswer;

    let record = create_call_log(&conn, &unanswered).unwrap();
    assert!(record.provider_call_id.is_none());

    let mut another = unanswered.clone();
    another.attempt_id = "attempt-3".to_string();
    create_call_log(&conn, &another).expect("several rows may lack a provider id");
    assert_eq!(row_count(&conn), 2);
}

#[test]
fn create_rejects_empty_phone_number() {
    let conn = test_db();
    let mut bad = answered_call("attempt-1", "CA1");
    bad.phone_number = "  ".to_string();

    match create_call_log(&conn, &bad) {
        Err(CallLogError::Invalid(msg)) => assert!(msg.contains("phone_number")),
        other => panic!("expected Invalid, got {other:?}"),
    }
    assert_eq!(row_count(&conn), 0);
}

// ── attach_recording ─────────────────────────────────────────────────

#[test]
fn create_rejects_provider_id_reused_by_another_attempt() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA900")).unwrap();

    let err = create_call_log(&conn, &answered_call("attempt-2", "CA900")).unwrap_err();
    assert!(matches!(err, CallLogError::Invalid(ref msg) if msg.contains("CA900")));
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn attach_recording_is_idempotent() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();

    let url = "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1";
    assert_eq!(
        attach_recording(&conn, "CA123", url, "RE1").unwrap(),
        EnrichOutcome::Applied
    );
    let after_first = get_by_provider_call_id(&conn, "CA123").unwrap().unwrap();

    assert_eq!(
        attach_recording(&conn, "CA123", url, "RE1").unwrap(),
        EnrichOutcome::Unchanged
    );
    let after_second = get_by_provider_call_id(&conn, "CA123").unwrap().unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(after_second.recording_url.as_deref(), Some(url));
    assert_eq!(after_second.recording_sid.as_deref(), Some("RE1"));
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn attach_recording_without_row_is_a_noop() {
    let conn = test_db();
    let outcome = attach_recording(&conn, "CA-missing", "https://example.test/r", "RE9").unwrap();
    assert_eq!(outcome, EnrichOutcome::NoMatchingRow);
    assert_eq!(row_count(&conn), 0, "enrichment never creates rows");
}

#[test]
fn attach_recording_never_clears_fields() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();
    attach_recording(&conn, "CA123", "https://example.test/r", "RE1").unwrap();

    assert!(matches!(
        attach_recording(&conn, "CA123", "", "RE1"),
        Err(CallLogError::Invalid(_))
    ));
    let record = get_by_provider_call_id(&conn, "CA123").unwrap().unwrap();
    assert_eq!(record.recording_url.as_deref(), Some("https://example.test/r"));
}

// ── attach_transcript ────────────────────────────────────────────────

#[test]
fn attach_transcript_keeps_first_timestamp_on_repeat() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();

    let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    let later_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap();

    assert_eq!(
        attach_transcript(&conn, "CA123", "Hej, du har ringet til", first_at).unwrap(),
        EnrichOutcome::Applied
    );
    assert_eq!(
        attach_transcript(&conn, "CA123", "Hej, du har ringet til", later_at).unwrap(),
        EnrichOutcome::Unchanged
    );

    let record = get_by_provider_call_id(&conn, "CA123").unwrap().unwrap();
    assert_eq!(record.transcript.as_deref(), Some("Hej, du har ringet til"));
    assert_eq!(record.transcribed_at.as_deref(), Some("2026-03-01T10:00:00.000Z"));
}

#[test]
fn enrichment_order_does_not_matter() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    attach_transcript(&conn, "CA123", "transcript", at).unwrap();
    attach_recording(&conn, "CA123", "https://example.test/r", "RE1").unwrap();

    let record = get_by_provider_call_id(&conn, "CA123").unwrap().unwrap();
    assert_eq!(record.transcript.as_deref(), Some("transcript"));
    assert_eq!(record.recording_sid.as_deref(), Some("RE1"));
}

#[test]
fn attach_transcript_without_row_is_a_noop() {
    let conn = test_db();
    let outcome = attach_transcript(&conn, "CA-missing", "text", Utc::now()).unwrap();
    assert_eq!(outcome, EnrichOutcome::NoMatchingRow);
}

// ── list_for_seller ──────────────────────────────────────────────────

#[test]
fn list_for_seller_is_scoped_and_newest_first() {
    let conn = test_db();
    create_call_log(&conn, &answered_call("attempt-1", "CA1")).unwrap();
    create_call_log(&conn, &answered_call("attempt-2", "CA2")).unwrap();
    let mut other = answered_call("attempt-3", "CA3");
    other.seller_id = "seller-8".to_string();
    create_call_log(&conn, &other).unwrap();

    let records = list_for_seller(&conn, "seller-7", 50).unwrap();
    let attempts: Vec<&str> = records.iter().map(|r| r.attempt_id.as_str()).collect();
    assert_eq!(attempts, vec!["attempt-2", "attempt-1"]);

    let limited = list_for_seller(&conn, "seller-7", 0).unwrap();
    assert_eq!(limited.len(), 1, "limit is clamped to at least one row");
}

#[test]
fn record_serializes_for_display() {
    let conn = test_db();
    let record = create_call_log(&conn, &answered_call("attempt-1", "CA123")).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["direction"], "outbound");
    assert_eq!(json["provider_call_id"], "CA123");
}
