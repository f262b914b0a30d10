//! Call log endpoints for the browser phone and the CRM.

use crate::middleware::IdentityContext;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Query},
    http::StatusCode,
};
use dialer_calllog::{create_call_log, list_for_seller, CallLogError, CallLogRecord, NewCallLog};
use dialer_types::CallReport;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub limit: Option<u32>,
}

fn store_error(e: CallLogError) -> (StatusCode, String) {
    match e {
        CallLogError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
        CallLogError::Database(e) => {
            tracing::error!(error = %e, "call log query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "call log unavailable".to_string(),
            )
        }
    }
}

/// Handler for `POST /api/calls`.
///
/// Writes the base row for a finished attempt. Repeating the request for the
/// same `attempt_id` returns the row stored the first time.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
    Json(report): Json<CallReport>,
) -> Result<(StatusCode, Json<CallLogRecord>), (StatusCode, String)> {
    let new = NewCallLog::from_report(user.user_id, report);

    let record = tokio::task::spawn_blocking({
        let pool = state.pool.clone();
        move || {
            let conn = pool.get().map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database unavailable".to_string(),
                )
            })?;
            create_call_log(&conn, &new).map_err(store_error)
        }
    })
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "call log write failed".to_string(),
        )
    })??;

    tracing::info!(
        attempt_id = %record.attempt_id,
        call_sid = ?record.provider_call_id,
        status = %record.status,
        duration_seconds = record.duration_seconds,
        "call logged"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// Handler for `GET /api/calls?limit=N`.
pub async fn list_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(user)): Extension<IdentityContext>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<Vec<CallLogRecord>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let records = tokio::task::spawn_blocking({
        let pool = state.pool.clone();
        move || {
            let conn = pool.get().map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database unavailable".to_string(),
                )
            })?;
            list_for_seller(&conn, &user.user_id, limit).map_err(store_error)
        }
    })
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "call log query failed".to_string(),
        )
    })??;

    Ok(Json(records))
}
