// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Appointment API tests: CRUD, validation, ownership, and calendar hooks.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use vitalsense::db::AppointmentStore;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{
    create_test_app, create_test_jwt, seed_appointment, seed_connected_user, seed_user,
    UNREACHABLE_GOOGLE,
};

const EVENTS: &str = "/calendar/v3/calendars/primary/events";

async fn send(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn request_body(title: &str, start: &str, end: &str) -> Value {
    json!({
        "title": title,
        "start": start,
        "end": end,
        "allDay": false,
        "clientId": Uuid::new_v4(),
    })
}

#[tokio::test]
async fn test_crud_round_trip() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    let (status, created) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("Intake", "2025-03-01T09:00:00Z", "2025-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Intake");
    assert_eq!(created["dieticianId"], user.id.to_string());
    assert_eq!(created["googleEventId"], Value::Null);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, "GET", &format!("/api/appointments/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/appointments/{}", id),
        &token,
        Some(request_body("Follow-up", "2025-03-02T09:00:00Z", "2025-03-02T09:30:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Follow-up");

    let (status, list) = send(&app, "GET", "/api/appointments", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/appointments/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/appointments/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    // End before start
    let (status, body) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("Intake", "2025-03-01T10:00:00Z", "2025-03-01T09:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    // Empty title
    let (status, _) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("", "2025-03-01T09:00:00Z", "2025-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Whitespace-only title
    let (status, _) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("   ", "2025-03-01T09:00:00Z", "2025-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/appointments/date/not-a-date", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/appointments/range/2025-01-01/2025-13-01", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/appointments/range/2025-01-01/10000-01-01", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_range_up_to_last_storable_day() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);
    let appt = seed_appointment(&db, user.id, Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(), None).await;

    let (status, list) = send(&app, "GET", "/api/appointments/range/2025-01-01/9999-12-31", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], appt.id.to_string());
}

#[tokio::test]
async fn test_foreign_appointment_forbidden() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let owner = seed_user(&db).await;
    let intruder = seed_user(&db).await;
    let appt = seed_appointment(&db, owner.id, Utc::now(), None).await;
    let token = create_test_jwt(intruder.id, &state.config.jwt_signing_key);

    let uri = format!("/api/appointments/{}", appt.id);
    let (status, _) = send(&app, "GET", &uri, &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(db.get_appointment(appt.id).await.unwrap().is_some());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/integrations/google-calendar/sync-appointment/{}", appt.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_date_and_range_queries() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    let day1 = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
    let day3 = Utc.with_ymd_and_hms(2025, 5, 3, 23, 0, 0).unwrap();
    let day4 = Utc.with_ymd_and_hms(2025, 5, 4, 0, 0, 0).unwrap();
    for start in [day3, day1, day4] {
        seed_appointment(&db, user.id, start, None).await;
    }

    let (status, list) = send(&app, "GET", "/api/appointments/date/2025-05-01", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    // Inverted bounds are swapped; the 4th at 00:00 is outside [1st, 4th).
    let (status, list) =
        send(&app, "GET", "/api/appointments/range/2025-05-03/2025-05-01", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let starts: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["start"].as_str().unwrap())
        .collect();
    assert_eq!(starts, vec!["2025-05-01T08:00:00Z", "2025-05-03T23:00:00Z"]);
}

#[tokio::test]
async fn test_create_syncs_for_connected_owner() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-42"})))
        .expect(1)
        .mount(&server)
        .await;

    let (status, created) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("Intake", "2030-03-01T09:00:00Z", "2030-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["googleEventId"], "evt-42");

    let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
    let stored = db.get_appointment(id).await.unwrap().unwrap();
    assert_eq!(stored.google_event_id.as_deref(), Some("evt-42"));
}

#[tokio::test]
async fn test_create_succeeds_when_calendar_fails() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (status, created) = send(
        &app,
        "POST",
        "/api/appointments",
        &token,
        Some(request_body("Intake", "2030-03-01T09:00:00Z", "2030-03-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["googleEventId"], Value::Null);
}

#[tokio::test]
async fn test_update_resyncs_synced_appointment() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let appt = seed_appointment(&db, user.id, Utc::now() + Duration::days(2), Some("evt-7")).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(method("GET"))
        .and(path(format!("{}/evt-7", EVENTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-7"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/evt-7", EVENTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-7"})))
        .expect(1)
        .mount(&server)
        .await;

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/appointments/{}", appt.id),
        &token,
        Some(request_body("Moved", "2030-03-02T09:00:00Z", "2030-03-02T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["googleEventId"], "evt-7");
}

#[tokio::test]
async fn test_delete_removes_remote_event_first() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let appt = seed_appointment(&db, user.id, Utc::now() + Duration::days(2), Some("evt-9")).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(method("DELETE"))
        .and(path(format!("{}/evt-9", EVENTS)))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    // Remote failure does not block local deletion.
    let (status, _) = send(&app, "DELETE", &format!("/api/appointments/{}", appt.id), &token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(db.get_appointment(appt.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sync_endpoints() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let appt = seed_appointment(&db, user.id, Utc::now() + Duration::days(2), None).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-s"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/evt-s", EVENTS)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let base = "/api/integrations/google-calendar";

    let (status, body) = send(&app, "POST", &format!("{}/sync-appointment/{}", base, appt.id), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["isAlreadySynced"], false);
    assert_eq!(
        db.get_appointment(appt.id).await.unwrap().unwrap().google_event_id.as_deref(),
        Some("evt-s")
    );

    let (_, body) = send(&app, "POST", &format!("{}/unsync-appointment/{}", base, appt.id), &token, None).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["wasSynced"], true);
    assert_eq!(db.get_appointment(appt.id).await.unwrap().unwrap().google_event_id, None);

    let (_, body) = send(&app, "POST", &format!("{}/validate-appointment/{}", base, appt.id), &token, None).await;
    assert_eq!(body["isValid"], true);
    assert_eq!(body["isSynced"], false);
}

#[tokio::test]
async fn test_validate_endpoint_cleans_stale_reference() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    let appt = seed_appointment(&db, user.id, Utc::now() + Duration::days(2), Some("evt-old")).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    Mock::given(method("GET"))
        .and(path(format!("{}/evt-old", EVENTS)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/integrations/google-calendar/validate-appointment/{}", appt.id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleanupPerformed"], true);
    assert_eq!(body["isValid"], false);
    assert_eq!(db.get_appointment(appt.id).await.unwrap().unwrap().google_event_id, None);
}

#[tokio::test]
async fn test_sync_all_endpoint() {
    let server = MockServer::start().await;
    let (app, state, db) = create_test_app(&server.uri());
    let token_for = |id| create_test_jwt(id, &state.config.jwt_signing_key);

    // Unknown user
    let (status, _) = send(
        &app,
        "POST",
        "/api/integrations/google-calendar/sync-all",
        &token_for(Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Not connected
    let disconnected = seed_user(&db).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/integrations/google-calendar/sync-all",
        &token_for(disconnected.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let user = seed_connected_user(&db, Utc::now() + Duration::hours(1)).await;
    seed_appointment(&db, user.id, Utc::now() + Duration::days(1), None).await;
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-all"})))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/integrations/google-calendar/sync-all",
        &token_for(user.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["totalAppointments"], 1);
    assert_eq!(body["details"]["syncedSuccessfully"], 1);
    assert_eq!(body["details"]["syncFailed"], 0);
}
