// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Calendar client and appointment synchronizer.
//!
//! The synchronizer keeps one remote event per appointment on the owner's
//! primary calendar. It only mutates the in-memory appointment; callers
//! persist `google_event_id` whenever it changed.

use crate::error::AppError;
use crate::models::{Appointment, User};
use crate::services::google_auth::{check_response, GoogleAuthService};
use crate::time_utils::format_utc_millis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Time zone sent with every event; all stored times are UTC.
const EVENT_TIME_ZONE: &str = "UTC";

/// Google Calendar API client scoped to the primary calendar.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    /// Create an event and return its ID.
    pub async fn create_event(
        &self,
        access_token: &str,
        event: &GoogleEventPayload,
    ) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Event create request failed: {}", e)))?;

        let created: CreatedEvent = check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))?;

        if created.id.is_empty() {
            return Err(AppError::GoogleApi(
                "Event create response had no id".to_string(),
            ));
        }
        Ok(created.id)
    }

    /// Replace an existing event's fields.
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &GoogleEventPayload,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .put(self.event_url(event_id))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Event update request failed: {}", e)))?;

        check_response(response).await?;
        Ok(())
    }

    /// Delete an event. An event that is already gone counts as deleted.
    pub async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.event_url(event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Event delete request failed: {}", e)))?;

        match check_response(response).await {
            Ok(_) => Ok(()),
            Err(AppError::GoogleNotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Whether the event still exists. Only a 404 means `false`.
    pub async fn event_exists(&self, access_token: &str, event_id: &str) -> Result<bool, AppError> {
        let response = self
            .http
            .get(self.event_url(event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Event lookup request failed: {}", e)))?;

        match check_response(response).await {
            Ok(_) => Ok(true),
            Err(AppError::GoogleNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    #[serde(default)]
    id: String,
}

/// Request body for event create/update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleEventPayload {
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

impl EventDateTime {
    fn utc(instant: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            date_time: format_utc_millis(instant),
            time_zone: EVENT_TIME_ZONE.to_string(),
        }
    }
}

impl GoogleEventPayload {
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            summary: appointment.title.clone(),
            start: EventDateTime::utc(appointment.start),
            end: EventDateTime::utc(appointment.end),
            description: format!("VitalSense appointment - {}", appointment.title),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CalendarSyncService
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`CalendarSyncService::sync_appointment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A remote event was created for a never-synced appointment.
    Created { event_id: String },
    /// The existing remote event was updated in place.
    Updated,
    /// The stored event had been deleted remotely and was replaced.
    Recreated {
        stale_event_id: String,
        event_id: String,
    },
    Failed,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncOutcome::Failed)
    }
}

/// Result of [`CalendarSyncService::validate_appointment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    NotSynced,
    Valid,
    /// The remote event was missing; the stored ID has been cleared.
    CleanedUp,
    /// No token, or the existence check failed for another reason.
    Unverifiable,
}

/// Keeps appointments and their Google Calendar events consistent.
///
/// Every operation obtains a token from the broker first. Remote failures
/// are logged and reported through the return value, never as errors.
#[derive(Clone)]
pub struct CalendarSyncService {
    client: GoogleCalendarClient,
    auth: Arc<GoogleAuthService>,
}

impl CalendarSyncService {
    pub fn new(client: GoogleCalendarClient, auth: Arc<GoogleAuthService>) -> Self {
        Self { client, auth }
    }

    async fn access_token(&self, user: &User) -> Option<String> {
        if !user.has_google_credentials() {
            tracing::debug!(user_id = %user.id, "User has no Google credentials");
            return None;
        }

        let token = self.auth.get_valid_access_token(user.id).await;
        if token.is_none() {
            tracing::warn!(user_id = %user.id, "No valid Google access token");
        }
        token
    }

    /// Create or update the remote event for `appointment`.
    ///
    /// A stored event that no longer exists remotely is cleared and
    /// recreated. If existence cannot be determined, nothing changes.
    pub async fn sync_appointment(&self, appointment: &mut Appointment, user: &User) -> SyncOutcome {
        let Some(token) = self.access_token(user).await else {
            return SyncOutcome::Failed;
        };

        let payload = GoogleEventPayload::from_appointment(appointment);

        let Some(existing) = appointment.google_event_id.clone().filter(|id| !id.is_empty()) else {
            return match self.create(&token, appointment, &payload).await {
                Some(event_id) => SyncOutcome::Created { event_id },
                None => SyncOutcome::Failed,
            };
        };

        match self.client.event_exists(&token, &existing).await {
            Ok(true) => match self.client.update_event(&token, &existing, &payload).await {
                Ok(()) => {
                    tracing::info!(
                        appointment_id = %appointment.id,
                        google_event_id = %existing,
                        "Updated Google Calendar event"
                    );
                    SyncOutcome::Updated
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        appointment_id = %appointment.id,
                        google_event_id = %existing,
                        "Failed to update Google Calendar event"
                    );
                    SyncOutcome::Failed
                }
            },
            Ok(false) => {
                tracing::warn!(
                    appointment_id = %appointment.id,
                    google_event_id = %existing,
                    "Google Calendar event missing, recreating"
                );
                appointment.google_event_id = None;
                match self.create(&token, appointment, &payload).await {
                    Some(event_id) => SyncOutcome::Recreated {
                        stale_event_id: existing,
                        event_id,
                    },
                    None => SyncOutcome::Failed,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.id,
                    google_event_id = %existing,
                    "Could not check Google Calendar event, leaving it alone"
                );
                SyncOutcome::Failed
            }
        }
    }

    async fn create(
        &self,
        token: &str,
        appointment: &mut Appointment,
        payload: &GoogleEventPayload,
    ) -> Option<String> {
        match self.client.create_event(token, payload).await {
            Ok(event_id) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    google_event_id = %event_id,
                    "Created Google Calendar event"
                );
                appointment.google_event_id = Some(event_id.clone());
                Some(event_id)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.id,
                    "Failed to create Google Calendar event"
                );
                None
            }
        }
    }

    /// Remove the remote event and clear the stored ID.
    ///
    /// An appointment without an event ID succeeds without a remote call.
    pub async fn unsync_appointment(&self, appointment: &mut Appointment, user: &User) -> bool {
        if !appointment.is_synced() {
            return true;
        }

        if self.delete_remote_event(appointment, user).await {
            appointment.google_event_id = None;
            true
        } else {
            false
        }
    }

    /// Check that the stored event still exists, clearing the ID if it does not.
    pub async fn validate_appointment(
        &self,
        appointment: &mut Appointment,
        user: &User,
    ) -> ValidationOutcome {
        let Some(event_id) = appointment.google_event_id.clone().filter(|id| !id.is_empty()) else {
            return ValidationOutcome::NotSynced;
        };

        let Some(token) = self.access_token(user).await else {
            return ValidationOutcome::Unverifiable;
        };

        match self.client.event_exists(&token, &event_id).await {
            Ok(true) => ValidationOutcome::Valid,
            Ok(false) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    google_event_id = %event_id,
                    "Google Calendar event gone, clearing reference"
                );
                appointment.google_event_id = None;
                ValidationOutcome::CleanedUp
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.id,
                    google_event_id = %event_id,
                    "Failed to validate Google Calendar event"
                );
                ValidationOutcome::Unverifiable
            }
        }
    }

    /// Best-effort delete of the remote event. Does not touch the appointment.
    pub async fn delete_remote_event(&self, appointment: &Appointment, user: &User) -> bool {
        let Some(event_id) = appointment.google_event_id.as_deref().filter(|id| !id.is_empty())
        else {
            return true;
        };

        let Some(token) = self.access_token(user).await else {
            return false;
        };

        match self.client.delete_event(&token, event_id).await {
            Ok(()) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    google_event_id = %event_id,
                    "Deleted Google Calendar event"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.id,
                    google_event_id = %event_id,
                    "Failed to delete Google Calendar event"
                );
                false
            }
        }
    }
}
