use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use dialer_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use dialer_server::{app, config::Config, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn setup() -> (TempDir, DbPool, Router) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dialer.db");
    let pool = create_pool(db_path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO user_sessions (token, user_id) VALUES ('anna-session', 'anna')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO user_sessions (token, user_id) VALUES ('bo-session', 'bo')",
            [],
        )
        .unwrap();
    }

    let state = AppState::from_config(pool.clone(), &Config::default());
    (dir, pool, app(state))
}

async fn post_report(app: &Router, session: &str, report: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/calls")
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(report.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn list(app: &Router, session: &str, query: &str) -> Vec<Value> {
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/calls{query}"))
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_call_attributes_seller_from_session() {
    let (_dir, _pool, app) = setup();
    let (status, body) = post_report(
        &app,
        "anna-session",
        json!({
            "attempt_id": "a-1",
            "phone_number": "12345678",
            "country_code": "45",
            "duration_seconds": 5,
            "status": "completed",
            "provider_call_id": "CA123",
            "lead_id": "lead-9"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["seller_id"], "anna");
    assert_eq!(body["direction"], "outbound");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["duration_seconds"], 5);
    assert_eq!(body["provider_call_id"], "CA123");
    assert_eq!(body["lead_id"], "lead-9");
    assert!(body["recording_url"].is_null());
    assert!(body["transcript"].is_null());
}

#[tokio::test]
async fn test_create_call_without_provider_id() {
    let (_dir, _pool, app) = setup();
    let (status, body) = post_report(
        &app,
        "anna-session",
        json!({
            "attempt_id": "a-2",
            "phone_number": "12345678",
            "country_code": "45",
            "duration_seconds": 0,
            "status": "no_answer"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "no_answer");
    assert!(body["provider_call_id"].is_null());
}

#[tokio::test]
async fn test_repeated_report_keeps_first_row() {
    let (_dir, pool, app) = setup();
    let report = json!({
        "attempt_id": "a-3",
        "phone_number": "12345678",
        "country_code": "45",
        "duration_seconds": 7,
        "status": "completed",
        "provider_call_id": "CA300"
    });

    let (first_status, first) = post_report(&app, "anna-session", report.clone()).await;
    let (second_status, second) = post_report(&app, "anna-session", report).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::CREATED);
    assert_eq!(first["id"], second["id"]);

    let conn = pool.get().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM call_logs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_create_call_rejects_invalid_report() {
    let (_dir, _pool, app) = setup();
    let (status, _) = post_report(
        &app,
        "anna-session",
        json!({
            "attempt_id": "",
            "phone_number": "12345678",
            "country_code": "45",
            "duration_seconds": 3,
            "status": "completed"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_id_reused_by_new_attempt_is_bad_request() {
    let (_dir, _pool, app) = setup();
    let report = |attempt_id: &str| {
        json!({
            "attempt_id": attempt_id,
            "phone_number": "12345678",
            "country_code": "45",
            "duration_seconds": 4,
            "status": "completed",
            "provider_call_id": "CA777"
        })
    };

    let (first, _) = post_report(&app, "anna-session", report("a-7")).await;
    assert_eq!(first, StatusCode::CREATED);
    let (second, _) = post_report(&app, "anna-session", report("a-8")).await;
    assert_eq!(second, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_call_requires_session() {
    let (_dir, _pool, app) = setup();
    let response = app
        .oneshot(
            Request::post("/api/calls")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_is_scoped_to_seller_and_limited() {
    let (_dir, _pool, app) = setup();
    for i in 0..3 {
        let (status, _) = post_report(
            &app,
            "anna-session",
            json!({
                "attempt_id": format!("anna-{i}"),
                "phone_number": "12345678",
                "country_code": "45",
                "duration_seconds": i,
                "status": if i == 0 { "no_answer" } else { "completed" }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    post_report(
        &app,
        "bo-session",
        json!({
            "attempt_id": "bo-1",
            "phone_number": "87654321",
            "country_code": "45",
            "duration_seconds": 0,
            "status": "busy"
        }),
    )
    .await;

    let anna = list(&app, "anna-session", "").await;
    assert_eq!(anna.len(), 3);
    assert!(anna.iter().all(|row| row["seller_id"] == "anna"));

    let limited = list(&app, "anna-session", "?limit=2").await;
    assert_eq!(limited.len(), 2);

    let bo = list(&app, "bo-session", "").await;
    assert_eq!(bo.len(), 1);
    assert_eq!(bo[0]["status"], "busy");
}
