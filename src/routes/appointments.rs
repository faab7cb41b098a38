// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Appointment CRUD routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Appointment, AppointmentRequest};
use crate::time_utils::is_storable_date;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

/// Appointment routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route(
            "/api/appointments/{id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/api/appointments/date/{date}", get(list_for_date))
        .route("/api/appointments/range/{from}/{to}", get(list_in_range))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AppointmentResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub title: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end: DateTime<Utc>,
    pub all_day: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub dietician_id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub client_id: Uuid,
    pub google_event_id: Option<String>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            title: a.title,
            start: a.start,
            end: a.end,
            all_day: a.all_day,
            dietician_id: a.dietician_id,
            client_id: a.client_id,
            google_event_id: a.google_event_id,
        }
    }
}

fn to_responses(appointments: Vec<Appointment>) -> Json<Vec<AppointmentResponse>> {
    Json(appointments.into_iter().map(Into::into).collect())
}

fn validated(request: &AppointmentRequest) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .filter(|date| is_storable_date(*date))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>)> {
    validated(&request)?;
    let appointment = state.appointments.create(user.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(appointment.into())))
}

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AppointmentResponse>>> {
    let appointments = state.appointments.list_for_owner(user.user_id).await?;
    Ok(to_responses(appointments))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>> {
    let appointment = state.appointments.get_owned(id, user.user_id).await?;
    Ok(Json(appointment.into()))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<AppointmentRequest>,
) -> Result<Json<AppointmentResponse>> {
    validated(&request)?;
    let appointment = state
        .appointments
        .update(id, user.user_id, &request)
        .await?;
    Ok(Json(appointment.into()))
}

async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.appointments.delete(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_for_date(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(date): Path<String>,
) -> Result<Json<Vec<AppointmentResponse>>> {
    let date = parse_date(&date)?;
    let appointments = state.appointments.list_for_date(user.user_id, date).await?;
    Ok(to_responses(appointments))
}

async fn list_in_range(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<Vec<AppointmentResponse>>> {
    let (from, to) = (parse_date(&from)?, parse_date(&to)?);
    let appointments = state
        .appointments
        .list_in_range(user.user_id, from, to)
        .await?;
    Ok(to_responses(appointments))
}
