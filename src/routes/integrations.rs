// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth and Google Calendar integration routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::{ConnectionResult, ConnectionStatus, SyncOutcome, ValidationOutcome};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Routes that require authentication.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/integrations/google/authorize", get(authorize))
        .route("/api/integrations/google/status", get(status))
        .route("/api/integrations/google/disconnect", post(disconnect))
        .route(
            "/api/integrations/google-calendar/sync-appointment/{id}",
            post(sync_appointment),
        )
        .route(
            "/api/integrations/google-calendar/unsync-appointment/{id}",
            post(unsync_appointment),
        )
        .route(
            "/api/integrations/google-calendar/validate-appointment/{id}",
            post(validate_appointment),
        )
        .route(
            "/api/integrations/google-calendar/sync-all",
            post(sync_all),
        )
}

/// OAuth callback; the signed `state` identifies the user.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/integrations/google/callback", post(callback))
}

// ─── OAuth ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AuthUrlResponse>> {
    let auth_url = state.google_auth.authorization_url(user.user_id)?;
    tracing::info!(user_id = %user.user_id, "Starting Google OAuth flow");
    Ok(Json(AuthUrlResponse { auth_url }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<ConnectionResult>> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Err(AppError::BadRequest(format!("Google authorization failed: {}", error)));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Invalid callback parameters".to_string()))?;

    let user_id = params
        .state
        .as_deref()
        .and_then(|s| state.google_auth.verify_state(s))
        .ok_or_else(|| AppError::BadRequest("Invalid callback parameters".to_string()))?;

    Ok(Json(
        state.google_auth.handle_oauth_callback(&code, user_id).await,
    ))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionStatus>> {
    Ok(Json(state.google_auth.connection_status(user.user_id).await?))
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionResult>> {
    let success = state.google_auth.disconnect(user.user_id).await?;
    Ok(Json(ConnectionResult {
        success,
        message: if success {
            "Google Calendar disconnected successfully"
        } else {
            "Failed to disconnect Google Calendar"
        }
        .to_string(),
    }))
}

// ─── Calendar sync ───────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncAppointmentResponse {
    pub success: bool,
    pub message: String,
    pub is_already_synced: bool,
}

async fn sync_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SyncAppointmentResponse>> {
    let result = state.appointments.sync_to_calendar(id, user.user_id).await?;

    let message = match result.outcome {
        SyncOutcome::Created { .. } => "Appointment synced to Google Calendar successfully",
        SyncOutcome::Recreated { .. } => {
            "Appointment was missing from Google Calendar and has been recreated"
        }
        SyncOutcome::Updated => "Appointment updated in Google Calendar successfully",
        SyncOutcome::Failed => "Failed to sync appointment to Google Calendar",
    };

    Ok(Json(SyncAppointmentResponse {
        success: result.outcome.is_success(),
        message: message.to_string(),
        is_already_synced: result.was_synced,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UnsyncAppointmentResponse {
    pub success: bool,
    pub message: String,
    pub was_synced: bool,
}

async fn unsync_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<UnsyncAppointmentResponse>> {
    let result = state
        .appointments
        .unsync_from_calendar(id, user.user_id)
        .await?;

    let message = match (result.success, result.was_synced) {
        (true, true) => "Appointment unsynced from Google Calendar successfully",
        (true, false) => "Appointment was not synced to Google Calendar",
        (false, _) => "Failed to unsync appointment from Google Calendar",
    };

    Ok(Json(UnsyncAppointmentResponse {
        success: result.success,
        message: message.to_string(),
        was_synced: result.was_synced,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ValidateAppointmentResponse {
    pub is_valid: bool,
    pub is_synced: bool,
    pub cleanup_performed: bool,
    pub message: String,
}

impl From<ValidationOutcome> for ValidateAppointmentResponse {
    fn from(outcome: ValidationOutcome) -> Self {
        let (is_valid, is_synced, cleanup_performed, message) = match outcome {
            ValidationOutcome::NotSynced => (
                true,
                false,
                false,
                "Appointment is not synced to Google Calendar",
            ),
            ValidationOutcome::Valid => (true, true, false, "Appointment sync is valid"),
            ValidationOutcome::CleanedUp => (
                false,
                false,
                true,
                "Stale sync reference cleaned up - event was deleted from Google Calendar",
            ),
            ValidationOutcome::Unverifiable => {
                (false, true, false, "Unable to verify sync status")
            }
        };
        Self {
            is_valid,
            is_synced,
            cleanup_performed,
            message: message.to_string(),
        }
    }
}

async fn validate_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidateAppointmentResponse>> {
    let outcome = state
        .appointments
        .validate_calendar_sync(id, user.user_id)
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncAllDetails {
    pub total_appointments: usize,
    pub synced_successfully: usize,
    pub sync_failed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncAllResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SyncAllDetails>,
}

async fn sync_all(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let profile = state
        .store
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user.user_id)))?;

    if !profile.is_google_calendar_connected() {
        let body = SyncAllResponse {
            success: false,
            message: "Google Calendar is not connected. Please connect Google Calendar first."
                .to_string(),
            details: None,
        };
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let summary = state
        .sync_job
        .sync_all_future_appointments(user.user_id)
        .await?;

    Ok(Json(SyncAllResponse {
        success: summary.failed == 0,
        message: format!(
            "Synced {} of {} future appointments to Google Calendar",
            summary.synced, summary.total
        ),
        details: Some(SyncAllDetails {
            total_appointments: summary.total,
            synced_successfully: summary.synced,
            sync_failed: summary.failed,
        }),
    })
    .into_response())
}
