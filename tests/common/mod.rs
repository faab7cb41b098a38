// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use vitalsense::config::Config;
use vitalsense::db::{AppointmentStore, FirestoreDb, MemoryDb, UserStore};
use vitalsense::models::{Appointment, User};
use vitalsense::routes::create_router;
use vitalsense::AppState;

/// Address nothing listens on; Google calls fail fast.
#[allow(dead_code)]
pub const UNREACHABLE_GOOGLE: &str = "http://127.0.0.1:9";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// In-memory app whose Google endpoints all live under `google_base`.
///
/// Returns the router, the shared state, and a handle on the backing store.
#[allow(dead_code)]
pub fn create_test_app(google_base: &str) -> (axum::Router, Arc<AppState>, MemoryDb) {
    let mut config = Config::test_default();
    config.google = config.google.with_base_url(google_base);

    let db = MemoryDb::new();
    let state = Arc::new(AppState::new(config, Arc::new(db.clone())).expect("state"));

    (create_router(state.clone()), state, db)
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Store a user with Google tokens expiring at `expiry`.
#[allow(dead_code)]
pub async fn seed_connected_user(db: &MemoryDb, expiry: DateTime<Utc>) -> User {
    let user = User {
        google_access_token: Some("stored-access".to_string()),
        google_refresh_token: Some("stored-refresh".to_string()),
        google_token_expiry: Some(expiry),
        ..User::new(Uuid::new_v4(), "dietician", "dietician@example.com")
    };
    db.upsert_user(&user).await.unwrap();
    user
}

/// Store a user without Google credentials.
#[allow(dead_code)]
pub async fn seed_user(db: &MemoryDb) -> User {
    let user = User::new(Uuid::new_v4(), "dietician", "dietician@example.com");
    db.upsert_user(&user).await.unwrap();
    user
}

/// Store an appointment owned by `owner` starting at `start`.
#[allow(dead_code)]
pub async fn seed_appointment(
    db: &MemoryDb,
    owner: Uuid,
    start: DateTime<Utc>,
    google_event_id: Option<&str>,
) -> Appointment {
    let appointment = Appointment {
        id: Uuid::new_v4(),
        title: "Consultation".to_string(),
        start,
        end: start + Duration::hours(1),
        all_day: false,
        dietician_id: owner,
        client_id: Uuid::new_v4(),
        google_event_id: google_event_id.map(str::to_string),
    };
    db.create_appointment(&appointment).await.unwrap();
    appointment
}
