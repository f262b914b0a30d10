//! Voice endpoints: browser tokens and the provider's webhooks.

use crate::background;
use crate::middleware::IdentityContext;
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use dialer_calllog::{attach_recording, EnrichOutcome};
use dialer_types::is_dialable;
use dialer_voice::{CallInstructions, IssuedToken, INSTRUCTIONS_CONTENT_TYPE, SIGNATURE_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Path the provider requests call instructions from.
pub const INSTRUCTIONS_PATH: &str = "/api/voice/instructions";

/// Path the provider reports finished recordings to.
pub const RECORDING_STATUS_PATH: &str = "/api/voice/recording-status";

type FormParams = Vec<(String, String)>;

#[derive(Debug, Error)]
enum InstructionsError {
    #[error("caller id is not configured")]
    MissingCallerId,
    #[error("public URL is not configured")]
    MissingPublicUrl,
}

fn form_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn read_form(form: Result<Form<FormParams>, FormRejection>) -> FormParams {
    match form {
        Ok(Form(params)) => params,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable provider form body");
            Vec::new()
        }
    }
}

/// Checks the provider signature over the URL the provider called.
///
/// The URL is rebuilt from the configured public base URL because the
/// server usually sits behind a proxy that rewrites scheme and host.
fn verify_provider_request(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    params: &[(String, String)],
) -> Result<(), StatusCode> {
    let Some(validator) = state.validator.as_ref() else {
        tracing::warn!(path = uri.path(), "rejecting provider request: no auth token configured");
        return Err(StatusCode::FORBIDDEN);
    };
    if state.public_url.is_empty() {
        tracing::warn!(path = uri.path(), "rejecting provider request: no public URL configured");
        return Err(StatusCode::FORBIDDEN);
    }

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let url = format!("{}{}", state.public_url, path);
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    validator.validate(&url, params, signature).map_err(|e| {
        tracing::warn!(error = %e, path = uri.path(), "rejecting provider request");
        StatusCode::FORBIDDEN
    })
}

/// Handler for `POST /api/voice/token`.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
) -> Result<Json<IssuedToken>, (StatusCode, Json<Value>)> {
    let Some(issuer) = state.token_issuer.as_ref() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "voice_not_configured",
                "message": "Signaling provider credentials are not configured."
            })),
        ));
    };

    let issued = issuer.issue(&user.user_id).map_err(|e| {
        tracing::error!(user_id = %user.user_id, error = %e, "failed to mint access token");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "token_generation_failed" })),
        )
    })?;

    tracing::debug!(
        user_id = %user.user_id,
        identity = %issued.identity,
        expires_at = issued.expires_at,
        "issued access token"
    );
    Ok(Json(issued))
}

fn build_instructions(
    state: &AppState,
    params: &[(String, String)],
) -> Result<CallInstructions, InstructionsError> {
    let to = form_value(params, "To").unwrap_or_default();
    let call_sid = form_value(params, "CallSid").unwrap_or("-");

    if !is_dialable(to) {
        tracing::info!(call_sid, to, "destination is not dial-able; speaking message");
        return Ok(CallInstructions::not_dialable(&state.say_language));
    }
    if state.caller_id.trim().is_empty() {
        return Err(InstructionsError::MissingCallerId);
    }
    if state.public_url.is_empty() {
        return Err(InstructionsError::MissingPublicUrl);
    }

    tracing::info!(call_sid, to, "bridging outbound call with recording");
    Ok(CallInstructions::dial(
        to,
        state.caller_id.trim(),
        format!("{}{}", state.public_url, RECORDING_STATUS_PATH),
    ))
}

/// Handler for `POST /api/voice/instructions`.
///
/// Every authenticated invocation gets a call-control document that ends
/// the call one way or another; internal failures become a spoken apology.
pub async fn instructions_handler(
    Extension(state): Extension<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    form: Result<Form<FormParams>, FormRejection>,
) -> Response {
    let params = read_form(form);
    if let Err(status) = verify_provider_request(&state, &uri, &headers, &params) {
        return status.into_response();
    }

    let document = build_instructions(&state, &params).unwrap_or_else(|e| {
        tracing::error!(error = %e, "cannot build call instructions; apologising");
        CallInstructions::apology(&state.say_language)
    });

    (
        [(header::CONTENT_TYPE, INSTRUCTIONS_CONTENT_TYPE)],
        document.to_xml(),
    )
        .into_response()
}

/// Handler for `POST /api/voice/recording-status`.
///
/// Always acknowledges a correctly signed request; enrichment problems are
/// logged, never reported back to the provider.
pub async fn recording_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    form: Result<Form<FormParams>, FormRejection>,
) -> StatusCode {
    let params = read_form(form);
    if let Err(status) = verify_provider_request(&state, &uri, &headers, &params) {
        return status;
    }

    let status = form_value(&params, "RecordingStatus").unwrap_or_default();
    let call_sid = form_value(&params, "CallSid");
    if status != "completed" {
        tracing::info!(call_sid = ?call_sid, status, "ignoring recording status");
        return StatusCode::OK;
    }

    let (Some(call_sid), Some(recording_sid), Some(recording_url)) = (
        call_sid,
        form_value(&params, "RecordingSid"),
        form_value(&params, "RecordingUrl"),
    ) else {
        tracing::warn!("completed recording callback is missing CallSid, RecordingSid or RecordingUrl");
        return StatusCode::OK;
    };
    let call_sid = call_sid.to_string();
    let recording_sid = recording_sid.to_string();
    let recording_url = recording_url.to_string();

    let result = tokio::task::spawn_blocking({
        let pool = state.pool.clone();
        let call_sid = call_sid.clone();
        let recording_url = recording_url.clone();
        move || {
            let conn = pool.get().map_err(|e| e.to_string())?;
            attach_recording(&conn, &call_sid, &recording_url, &recording_sid)
                .map_err(|e| e.to_string())
        }
    })
    .await;

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::error!(call_sid = %call_sid, error = %e, "failed to attach recording");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "recording attach task join error: {}", e);
            return StatusCode::OK;
        }
    };

    match outcome {
        EnrichOutcome::NoMatchingRow => {
            tracing::info!(call_sid = %call_sid, "no call log for recording yet; dropping enrichment");
        }
        EnrichOutcome::Applied | EnrichOutcome::Unchanged => {
            if outcome == EnrichOutcome::Unchanged {
                tracing::debug!(call_sid = %call_sid, "recording already attached");
            } else {
                tracing::info!(call_sid = %call_sid, "recording attached");
            }
            background::spawn_transcription(&state, call_sid, recording_url);
        }
    }

    StatusCode::OK
}
