// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the store traits.
//!
//! Provides typed operations for:
//! - Users (profile and Google credentials)
//! - Appointments (owned by a dietician, queried by start time)
//!
//! Timestamps are stored as second-precision RFC3339 strings with a `Z`
//! suffix so range filters on `start` compare lexicographically.

use crate::db::{collections, AppointmentStore, DateRange, UserStore};
use crate::error::AppError;
use crate::models::{Appointment, User};
use crate::time_utils::{format_utc_rfc3339, is_storable_date, parse_utc_rfc3339};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::{paths, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn put_appointment(&self, doc: &AppointmentDocument) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::APPOINTMENTS)
            .document_id(&doc.id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn put_user(&self, doc: &UserDocument) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&doc.id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_user_document(&self, id: Uuid) -> Result<Option<UserDocument>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_appointment_document(
        &self,
        id: Uuid,
    ) -> Result<Option<AppointmentDocument>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::APPOINTMENTS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn into_appointments(docs: Vec<AppointmentDocument>) -> Result<Vec<Appointment>, AppError> {
        docs.into_iter().map(Appointment::try_from).collect()
    }
}

#[async_trait]
impl AppointmentStore for FirestoreDb {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        self.get_appointment_document(id)
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn create_appointment(&self, appointment: &Appointment) -> Result<(), AppError> {
        self.put_appointment(&AppointmentDocument::from(appointment))
            .await
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        appointment: &Appointment,
    ) -> Result<bool, AppError> {
        if self.get_appointment(id).await?.is_none() {
            return Ok(false);
        }

        let mut doc = AppointmentDocument::from(appointment);
        doc.id = id.to_string();
        self.put_appointment(&doc).await?;
        Ok(true)
    }

    async fn set_google_event_id(
        &self,
        id: Uuid,
        event_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let Some(mut doc) = self.get_appointment_document(id).await? else {
            return Ok(false);
        };
        doc.google_event_id = event_id.map(str::to_string);

        // Field mask limits the write to the event ID; the precondition keeps
        // a concurrently deleted appointment from being recreated.
        let _: () = self
            .client
            .fluent()
            .update()
            .fields(paths!(AppointmentDocument::{google_event_id}))
            .in_col(collections::APPOINTMENTS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&doc.id)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool, AppError> {
        if self.get_appointment(id).await?.is_none() {
            return Ok(false);
        }

        self.client
            .fluent()
            .delete()
            .from(collections::APPOINTMENTS)
            .document_id(id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    async fn list_appointments_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<Appointment>, AppError> {
        let owner = owner.to_string();
        let docs: Vec<AppointmentDocument> = self
            .client
            .fluent()
            .select()
            .from(collections::APPOINTMENTS)
            .filter(move |q| q.for_all([q.field("dietician_id").eq(owner.clone())]))
            .order_by([("start", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::into_appointments(docs)
    }

    async fn list_appointments_in_range(
        &self,
        owner: Uuid,
        range: DateRange,
    ) -> Result<Vec<Appointment>, AppError> {
        let Some((from, until)) = start_bounds(range) else {
            return Ok(Vec::new());
        };
        let owner = owner.to_string();

        let docs: Vec<AppointmentDocument> = self
            .client
            .fluent()
            .select()
            .from(collections::APPOINTMENTS)
            .filter(move |q| {
                q.for_all([
                    q.field("dietician_id").eq(owner.clone()),
                    q.field("start").greater_than_or_equal(from.clone()),
                    until
                        .clone()
                        .and_then(|until| q.field("start").less_than(until)),
                ])
            })
            .order_by([("start", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::into_appointments(docs)
    }
}

#[async_trait]
impl UserStore for FirestoreDb {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.get_user_document(id)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.put_user(&UserDocument::from(user)).await
    }

    async fn set_google_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let Some(mut doc) = self.get_user_document(id).await? else {
            return Ok(false);
        };

        doc.google_access_token = Some(access_token.to_string());
        doc.google_refresh_token = Some(refresh_token.to_string());
        doc.google_token_expiry = Some(format_utc_rfc3339(expiry));
        self.put_user(&doc).await?;
        Ok(true)
    }

    async fn clear_google_tokens(&self, id: Uuid) -> Result<bool, AppError> {
        let Some(mut doc) = self.get_user_document(id).await? else {
            return Ok(false);
        };

        doc.google_access_token = None;
        doc.google_refresh_token = None;
        doc.google_token_expiry = None;
        self.put_user(&doc).await?;
        Ok(true)
    }
}

// ─── Stored document shapes ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppointmentDocument {
    id: String,
    title: String,
    start: String,
    end: String,
    all_day: bool,
    dietician_id: String,
    client_id: String,
    #[serde(default)]
    google_event_id: Option<String>,
}

impl From<&Appointment> for AppointmentDocument {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id.to_string(),
            title: a.title.clone(),
            start: format_utc_rfc3339(a.start),
            end: format_utc_rfc3339(a.end),
            all_day: a.all_day,
            dietician_id: a.dietician_id.to_string(),
            client_id: a.client_id.to_string(),
            google_event_id: a.google_event_id.clone(),
        }
    }
}

impl TryFrom<AppointmentDocument> for Appointment {
    type Error = AppError;

    fn try_from(doc: AppointmentDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&doc.id)?,
            title: doc.title,
            start: parse_time(&doc.start)?,
            end: parse_time(&doc.end)?,
            all_day: doc.all_day,
            dietician_id: parse_uuid(&doc.dietician_id)?,
            client_id: parse_uuid(&doc.client_id)?,
            google_event_id: doc.google_event_id.filter(|id| !id.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    id: String,
    username: String,
    email: String,
    created_at: String,
    #[serde(default)]
    google_access_token: Option<String>,
    #[serde(default)]
    google_refresh_token: Option<String>,
    #[serde(default)]
    google_token_expiry: Option<String>,
}

impl From<&User> for UserDocument {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username.clone(),
            email: u.email.clone(),
            created_at: format_utc_rfc3339(u.created_at),
            google_access_token: u.google_access_token.clone(),
            google_refresh_token: u.google_refresh_token.clone(),
            google_token_expiry: u.google_token_expiry.map(format_utc_rfc3339),
        }
    }
}

impl TryFrom<UserDocument> for User {
    type Error = AppError;

    fn try_from(doc: UserDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&doc.id)?,
            username: doc.username,
            email: doc.email,
            created_at: parse_time(&doc.created_at)?,
            google_access_token: doc.google_access_token,
            google_refresh_token: doc.google_refresh_token,
            google_token_expiry: doc
                .google_token_expiry
                .as_deref()
                .map(parse_time)
                .transpose()?,
        })
    }
}

/// String bounds on `start` for `range`.
///
/// `None` when the range begins past the last storable year. The upper bound
/// is dropped when it lies past that year, since every stored start sorts
/// below it anyway.
fn start_bounds(range: DateRange) -> Option<(String, Option<String>)> {
    if !is_storable_date(range.start.date_naive()) {
        return None;
    }
    let until = is_storable_date(range.end_exclusive.date_naive())
        .then(|| format_utc_rfc3339(range.end_exclusive));
    Some((format_utc_rfc3339(range.start), until))
}

fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::Database(format!("Invalid UUID '{}': {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, AppError> {
    parse_utc_rfc3339(raw).ok_or_else(|| AppError::Database(format!("Invalid timestamp '{}'", raw)))
}
