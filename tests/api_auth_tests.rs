// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Protected routes accept bearer headers and the session cookie
//! 3. Public routes stay reachable without a token
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{create_test_app, create_test_jwt, seed_user, UNREACHABLE_GOOGLE};

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = create_test_app(UNREACHABLE_GOOGLE);

    for uri in ["/api/appointments", "/api/integrations/google/status"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _, _) = create_test_app(UNREACHABLE_GOOGLE);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/appointments")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_wrong_key_rejected() {
    let (app, _, _) = create_test_app(UNREACHABLE_GOOGLE);
    let token = create_test_jwt(Uuid::new_v4(), b"some_other_signing_key_entirely!");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/appointments")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/appointments")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let (app, state, db) = create_test_app(UNREACHABLE_GOOGLE);
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/integrations/google/status")
                .header(header::COOKIE, format!("vitalsense_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["isConnected"], false);
    assert_eq!(json["connectedDate"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let (app, _, _) = create_test_app(UNREACHABLE_GOOGLE);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );

    // Missing code is a bad request, not an auth failure.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/integrations/google/callback")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authorize_returns_google_url() {
    let (app, state, db) = create_test_app("https://accounts.example.test");
    let user = seed_user(&db).await;
    let token = create_test_jwt(user.id, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/integrations/google/authorize")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let url = json["authUrl"].as_str().unwrap();
    assert!(url.starts_with("https://accounts.example.test/o/oauth2/v2/auth?"));
    assert!(url.contains("access_type=offline"));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = create_test_app(UNREACHABLE_GOOGLE);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/appointments")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}
