use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::AppState;

/// The CRM user behind a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Wrapper for `AuthenticatedUser` to be stored in request extensions.
#[derive(Clone, Debug)]
pub struct IdentityContext(pub AuthenticatedUser);

/// Resolves a bearer token to the user id of an active, unexpired session.
pub fn lookup_session(conn: &Connection, token: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT user_id FROM user_sessions
         WHERE token = ?1
           AND active = 1
           AND (expires_at IS NULL OR datetime(expires_at) > datetime('now'))",
        params![token],
        |row| row.get(0),
    )
    .optional()
}

/// Middleware to authenticate requests via `Authorization: Bearer <session token>`.
///
/// The session table is owned by the CRM login flow; this only reads it.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let user_id = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        lookup_session(&conn, &token).map_err(|e| {
            tracing::error!(error = %e, "session lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??
    .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut()
        .insert(IdentityContext(AuthenticatedUser { user_id }));

    Ok(next.run(req).await)
}
