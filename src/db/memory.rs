// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local development and tests.
//!
//! Data lives only as long as the process. Clones share the same maps.

use crate::db::{AppointmentStore, DateRange, UserStore};
use crate::error::AppError;
use crate::models::{Appointment, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<Uuid, User>>,
    appointments: Arc<DashMap<Uuid, Appointment>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut found: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl AppointmentStore for MemoryDb {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self.appointments.get(&id).map(|a| a.clone()))
    }

    async fn create_appointment(&self, appointment: &Appointment) -> Result<(), AppError> {
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        appointment: &Appointment,
    ) -> Result<bool, AppError> {
        match self.appointments.get_mut(&id) {
            Some(mut existing) => {
                *existing = Appointment {
                    id,
                    ..appointment.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_google_event_id(
        &self,
        id: Uuid,
        event_id: Option<&str>,
    ) -> Result<bool, AppError> {
        match self.appointments.get_mut(&id) {
            Some(mut existing) => {
                existing.google_event_id = event_id.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.appointments.remove(&id).is_some())
    }

    async fn list_appointments_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<Appointment>, AppError> {
        Ok(self.collect_sorted(|a| a.dietician_id == owner))
    }

    async fn list_appointments_in_range(
        &self,
        owner: Uuid,
        range: DateRange,
    ) -> Result<Vec<Appointment>, AppError> {
        Ok(self.collect_sorted(|a| a.dietician_id == owner && range.contains(a.start)))
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_google_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.google_access_token = Some(access_token.to_string());
                user.google_refresh_token = Some(refresh_token.to_string());
                user.google_token_expiry = Some(expiry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_google_tokens(&self, id: Uuid) -> Result<bool, AppError> {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.google_access_token = None;
                user.google_refresh_token = None;
                user.google_token_expiry = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
