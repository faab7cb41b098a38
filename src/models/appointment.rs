// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Appointment model and the create/update request body.

use crate::time_utils::is_storable_date;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_TITLE_LEN: u64 = 200;

/// An appointment between a dietician and one of their clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    /// Owning dietician (user ID)
    pub dietician_id: Uuid,
    pub client_id: Uuid,
    /// Google Calendar event ID; `None` until a remote event was created
    pub google_event_id: Option<String>,
}

impl Appointment {
    /// Build a new, never-synced appointment from a validated request.
    pub fn new(dietician_id: Uuid, request: &AppointmentRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            start: request.start,
            end: request.end,
            all_day: request.all_day,
            dietician_id,
            client_id: request.client_id,
            google_event_id: None,
        }
    }

    /// Overwrite the editable fields, keeping owner and remote event ID.
    pub fn apply(&mut self, request: &AppointmentRequest) {
        self.title = request.title.clone();
        self.start = request.start;
        self.end = request.end;
        self.all_day = request.all_day;
        self.client_id = request.client_id;
    }

    pub fn is_synced(&self) -> bool {
        self.google_event_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }
}

/// Body for creating or editing an appointment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_time_range"))]
pub struct AppointmentRequest {
    #[validate(
        length(min = 1, max = MAX_TITLE_LEN, message = "Title must be 1-200 characters."),
        custom(function = "validate_title_not_blank")
    )]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[validate(custom(function = "validate_client_id"))]
    pub client_id: Uuid,
}

fn validate_title_not_blank(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        let mut err = ValidationError::new("title_blank");
        err.message = Some("Title is required.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_time_range(request: &AppointmentRequest) -> Result<(), ValidationError> {
    if !is_storable_date(request.start.date_naive()) || !is_storable_date(request.end.date_naive()) {
        let mut err = ValidationError::new("date_out_of_range");
        err.message = Some("Dates must fall within years 0-9999.".into());
        return Err(err);
    }
    if request.end <= request.start {
        let mut err = ValidationError::new("end_before_start");
        err.message = Some("End must be after Start.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_client_id(client_id: &Uuid) -> Result<(), ValidationError> {
    if client_id.is_nil() {
        let mut err = ValidationError::new("client_id_required");
        err.message = Some("ClientId is required.".into());
        return Err(err);
    }
    Ok(())
}
