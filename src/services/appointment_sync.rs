// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bulk reconciliation of a user's upcoming appointments with Google Calendar.

use crate::db::{DateRange, Store};
use crate::error::AppError;
use crate::models::Appointment;
use crate::services::google_calendar::CalendarSyncService;
use chrono::{DateTime, Months, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// How far ahead the sweep looks.
pub const SYNC_LOOKAHEAD_MONTHS: u32 = 6;

/// Counts reported by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct AppointmentSyncJob {
    store: Arc<dyn Store>,
    calendar: Arc<CalendarSyncService>,
}

impl AppointmentSyncJob {
    pub fn new(store: Arc<dyn Store>, calendar: Arc<CalendarSyncService>) -> Self {
        Self { store, calendar }
    }

    pub async fn sync_all_future_appointments(
        &self,
        user_id: Uuid,
    ) -> Result<SyncSummary, AppError> {
        self.sync_all_future_appointments_at(user_id, Utc::now())
            .await
    }

    /// Sync every appointment of `user_id` starting strictly after `now` and
    /// within the lookahead window.
    ///
    /// A missing or disconnected user yields an empty summary. A failure on one
    /// appointment is counted and the sweep continues. Only store errors while
    /// loading the user or the appointment list are returned.
    pub async fn sync_all_future_appointments_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SyncSummary, AppError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            tracing::debug!(user_id = %user_id, "Bulk sync skipped: unknown user");
            return Ok(SyncSummary::default());
        };

        if !user.is_google_calendar_connected_at(now) {
            tracing::debug!(user_id = %user_id, "Bulk sync skipped: Google Calendar not connected");
            return Ok(SyncSummary::default());
        }

        let today = now.date_naive();
        let until = today
            .checked_add_months(Months::new(SYNC_LOOKAHEAD_MONTHS))
            .unwrap_or(NaiveDate::MAX);

        let appointments: Vec<Appointment> = self
            .store
            .list_appointments_in_range(user_id, DateRange::from_dates(today, until))
            .await?
            .into_iter()
            .filter(|a| a.start > now)
            .collect();

        let mut summary = SyncSummary {
            total: appointments.len(),
            ..SyncSummary::default()
        };

        tracing::info!(user_id = %user_id, total = summary.total, "Starting bulk calendar sync");

        for mut appointment in appointments {
            let before = appointment.google_event_id.clone();
            let outcome = self.calendar.sync_appointment(&mut appointment, &user).await;

            let persisted = if appointment.google_event_id != before {
                match self
                    .store
                    .set_google_event_id(appointment.id, appointment.google_event_id.as_deref())
                    .await
                {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!(
                            appointment_id = %appointment.id,
                            "Appointment disappeared during bulk sync"
                        );
                        false
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            appointment_id = %appointment.id,
                            "Failed to persist Google event id"
                        );
                        false
                    }
                }
            } else {
                true
            };

            if outcome.is_success() && persisted {
                summary.synced += 1;
            } else {
                summary.failed += 1;
            }
        }

        tracing::info!(
            user_id = %user_id,
            total = summary.total,
            synced = summary.synced,
            failed = summary.failed,
            "Bulk calendar sync finished"
        );

        Ok(summary)
    }
}
