// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod appointment_sync;
pub mod appointments;
pub mod google_auth;
pub mod google_calendar;

pub use appointment_sync::{AppointmentSyncJob, SyncSummary};
pub use appointments::{AppointmentService, SyncResult, UnsyncResult};
pub use google_auth::{ConnectionResult, ConnectionStatus, GoogleAuthService, GoogleOAuthClient};
pub use google_calendar::{
    CalendarSyncService, GoogleCalendarClient, GoogleEventPayload, SyncOutcome, ValidationOutcome,
};
