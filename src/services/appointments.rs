// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Appointment CRUD with Google Calendar hooks.
//!
//! Create, update and delete keep the owner's calendar in step when the owner
//! has Google credentials. Calendar failures are logged and never fail the
//! local operation.

use crate::db::{DateRange, Store};
use crate::error::AppError;
use crate::models::{Appointment, AppointmentRequest, User};
use crate::services::google_calendar::{CalendarSyncService, SyncOutcome, ValidationOutcome};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// Result of an explicit sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub outcome: SyncOutcome,
    /// The appointment carried an event ID before the request.
    pub was_synced: bool,
}

/// Result of an explicit unsync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsyncResult {
    pub success: bool,
    pub was_synced: bool,
}

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn Store>,
    calendar: Arc<CalendarSyncService>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn Store>, calendar: Arc<CalendarSyncService>) -> Self {
        Self { store, calendar }
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        self.store.get_appointment(id).await
    }

    /// Load appointment `id`, requiring that `owner` owns it.
    pub async fn get_owned(&self, id: Uuid, owner: Uuid) -> Result<Appointment, AppError> {
        let appointment = self
            .store
            .get_appointment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appointment {}", id)))?;

        if appointment.dietician_id != owner {
            tracing::warn!(
                appointment_id = %id,
                user_id = %owner,
                "Blocked access to another dietician's appointment"
            );
            return Err(AppError::Forbidden);
        }
        Ok(appointment)
    }

    pub async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<Appointment>, AppError> {
        self.store.list_appointments_for_owner(owner).await
    }

    pub async fn list_for_date(
        &self,
        owner: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppError> {
        self.store
            .list_appointments_in_range(owner, DateRange::day(date))
            .await
    }

    pub async fn list_in_range(
        &self,
        owner: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, AppError> {
        self.store
            .list_appointments_in_range(owner, DateRange::from_dates(from, to))
            .await
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// Store a new appointment and push it to the owner's calendar.
    pub async fn create(
        &self,
        owner: Uuid,
        request: &AppointmentRequest,
    ) -> Result<Appointment, AppError> {
        let mut appointment = Appointment::new(owner, request);
        self.store.create_appointment(&appointment).await?;
        tracing::info!(appointment_id = %appointment.id, user_id = %owner, "Appointment created");

        if let Some(user) = self.calendar_owner(owner).await {
            self.sync_and_persist(&mut appointment, &user).await;
        }

        Ok(appointment)
    }

    /// Overwrite the editable fields and resync a synced appointment.
    pub async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        request: &AppointmentRequest,
    ) -> Result<Appointment, AppError> {
        let mut appointment = self.get_owned(id, owner).await?;
        appointment.apply(request);

        if !self.store.update_appointment(id, &appointment).await? {
            return Err(AppError::NotFound(format!("Appointment {}", id)));
        }
        tracing::info!(appointment_id = %id, user_id = %owner, "Appointment updated");

        if appointment.is_synced() {
            if let Some(user) = self.calendar_owner(owner).await {
                self.sync_and_persist(&mut appointment, &user).await;
            }
        }

        Ok(appointment)
    }

    /// Delete the remote event (best effort), then the appointment.
    pub async fn delete(&self, id: Uuid, owner: Uuid) -> Result<(), AppError> {
        let appointment = self.get_owned(id, owner).await?;

        if appointment.is_synced() {
            if let Some(user) = self.calendar_owner(owner).await {
                if !self.calendar.delete_remote_event(&appointment, &user).await {
                    tracing::warn!(
                        appointment_id = %id,
                        "Could not delete Google Calendar event, deleting appointment anyway"
                    );
                }
            }
        }

        if !self.store.delete_appointment(id).await? {
            return Err(AppError::NotFound(format!("Appointment {}", id)));
        }
        tracing::info!(appointment_id = %id, user_id = %owner, "Appointment deleted");
        Ok(())
    }

    // ─── Explicit calendar actions ───────────────────────────────────────────

    pub async fn sync_to_calendar(&self, id: Uuid, owner: Uuid) -> Result<SyncResult, AppError> {
        let mut appointment = self.get_owned(id, owner).await?;
        let was_synced = appointment.is_synced();

        let outcome = match self.store.get_user(owner).await? {
            Some(user) => self.sync_and_persist(&mut appointment, &user).await,
            None => SyncOutcome::Failed,
        };

        Ok(SyncResult {
            outcome,
            was_synced,
        })
    }

    pub async fn unsync_from_calendar(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<UnsyncResult, AppError> {
        let mut appointment = self.get_owned(id, owner).await?;
        let was_synced = appointment.is_synced();

        let success = match self.store.get_user(owner).await? {
            Some(user) => self.calendar.unsync_appointment(&mut appointment, &user).await,
            None => !was_synced,
        };

        if success && was_synced {
            self.persist_event_id(&appointment).await?;
        }

        Ok(UnsyncResult {
            success,
            was_synced,
        })
    }

    pub async fn validate_calendar_sync(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<ValidationOutcome, AppError> {
        let mut appointment = self.get_owned(id, owner).await?;
        if !appointment.is_synced() {
            return Ok(ValidationOutcome::NotSynced);
        }

        let Some(user) = self.store.get_user(owner).await? else {
            return Ok(ValidationOutcome::Unverifiable);
        };

        let outcome = self
            .calendar
            .validate_appointment(&mut appointment, &user)
            .await;
        if outcome == ValidationOutcome::CleanedUp {
            self.persist_event_id(&appointment).await?;
        }
        Ok(outcome)
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    /// The owner, if their Google credentials allow a sync attempt.
    async fn calendar_owner(&self, owner: Uuid) -> Option<User> {
        match self.store.get_user(owner).await {
            Ok(Some(user)) if user.has_google_credentials() => Some(user),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %owner, "Failed to load appointment owner");
                None
            }
        }
    }

    /// Run a sync and write back the event ID if it changed.
    ///
    /// A failed write-back turns the outcome into `Failed`.
    async fn sync_and_persist(&self, appointment: &mut Appointment, user: &User) -> SyncOutcome {
        let before = appointment.google_event_id.clone();
        let outcome = self.calendar.sync_appointment(appointment, user).await;

        if appointment.google_event_id == before {
            return outcome;
        }

        match self.persist_event_id(appointment).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    appointment_id = %appointment.id,
                    "Failed to persist Google event id"
                );
                SyncOutcome::Failed
            }
        }
    }

    async fn persist_event_id(&self, appointment: &Appointment) -> Result<(), AppError> {
        if self
            .store
            .set_google_event_id(appointment.id, appointment.google_event_id.as_deref())
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Appointment {}", appointment.id)))
        }
    }
}
