// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! VitalSense: appointment scheduling for dieticians
//!
//! This crate provides the backend API for managing appointments and
//! keeping them in step with each dietician's Google Calendar.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use error::AppError;
use services::{
    google_auth::build_http_client, AppointmentService, AppointmentSyncJob, CalendarSyncService,
    GoogleAuthService, GoogleCalendarClient, GoogleOAuthClient,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub google_auth: Arc<GoogleAuthService>,
    pub calendar: Arc<CalendarSyncService>,
    pub appointments: AppointmentService,
    pub sync_job: AppointmentSyncJob,
}

impl AppState {
    /// Wire all services on top of `store`.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let http = build_http_client()?;

        let google_auth = Arc::new(GoogleAuthService::new(
            GoogleOAuthClient::new(http.clone(), config.google.clone()),
            store.clone(),
            config.oauth_state_key.clone(),
        ));
        let calendar = Arc::new(CalendarSyncService::new(
            GoogleCalendarClient::new(http, &config.google.calendar_api_url),
            google_auth.clone(),
        ));

        Ok(Self {
            appointments: AppointmentService::new(store.clone(), calendar.clone()),
            sync_job: AppointmentSyncJob::new(store.clone(), calendar.clone()),
            config,
            store,
            google_auth,
            calendar,
        })
    }
}
