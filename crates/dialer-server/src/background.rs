//! Background tasks for the dialer server.
//!
//! Includes:
//! - Transcribing finished call recordings.

use crate::AppState;
use chrono::Utc;
use dialer_calllog::{attach_transcript, EnrichOutcome};
use dialer_db::DbPool;
use dialer_voice::{RecordingFetcher, SttService, VoiceError};
use std::sync::Arc;
use thiserror::Error;

/// Why a transcription attempt gave up.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("recording fetch failed: {0}")]
    Fetch(VoiceError),

    #[error("speech-to-text failed: {0}")]
    Transcribe(VoiceError),

    #[error("call log update failed: {0}")]
    Store(String),
}

/// Starts a detached transcription of `recording_url` for `call_sid`.
///
/// Does nothing when transcription is not configured. The caller never
/// waits for the task.
pub fn spawn_transcription(state: &AppState, call_sid: String, recording_url: String) {
    let (Some(fetcher), Some(stt)) = (state.recording_fetcher.clone(), state.stt.clone()) else {
        tracing::debug!(call_sid = %call_sid, "transcription not configured; skipping");
        return;
    };
    let pool = state.pool.clone();

    tokio::spawn(async move {
        match transcribe_recording(&fetcher, &stt, &pool, &call_sid, &recording_url).await {
            Ok(Some(EnrichOutcome::Applied)) => {
                tracing::info!(call_sid = %call_sid, "transcript attached");
            }
            Ok(Some(EnrichOutcome::Unchanged)) => {
                tracing::debug!(call_sid = %call_sid, "transcript unchanged");
            }
            Ok(Some(EnrichOutcome::NoMatchingRow)) => {
                tracing::warn!(call_sid = %call_sid, "call log disappeared before transcript was stored");
            }
            Ok(None) => {
                tracing::info!(call_sid = %call_sid, "empty transcript; nothing stored");
            }
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, error = %e, "transcription abandoned");
            }
        }
    });
}

/// Fetches a recording, transcribes it and stores the transcript.
///
/// Returns `Ok(None)` when the recognizer produced no text.
///
/// # Errors
///
/// Returns an [`EnrichmentError`] naming the stage that failed. Nothing is
/// retried.
pub async fn transcribe_recording(
    fetcher: &RecordingFetcher,
    stt: &Arc<SttService>,
    pool: &DbPool,
    call_sid: &str,
    recording_url: &str,
) -> Result<Option<EnrichOutcome>, EnrichmentError> {
    let audio = fetcher
        .fetch(recording_url)
        .await
        .map_err(EnrichmentError::Fetch)?;

    let transcript = stt
        .transcribe(&audio)
        .await
        .map_err(EnrichmentError::Transcribe)?;
    let transcript = transcript.trim().to_string();
    if transcript.is_empty() {
        return Ok(None);
    }

    let pool = pool.clone();
    let call_sid = call_sid.to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| EnrichmentError::Store(e.to_string()))?;
        attach_transcript(&conn, &call_sid, &transcript, Utc::now())
            .map_err(|e| EnrichmentError::Store(e.to_string()))
    })
    .await
    .map_err(|e| EnrichmentError::Store(format!("join error: {}", e)))??;

    Ok(Some(outcome))
}
