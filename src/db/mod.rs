//! Database layer: store traits plus Firestore and in-memory backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Appointment, User};
use crate::time_utils::start_of_day_utc;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const APPOINTMENTS: &str = "appointments";
}

/// Appointment persistence.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError>;

    async fn create_appointment(&self, appointment: &Appointment) -> Result<(), AppError>;

    /// Replace the stored appointment `id`. Returns `false` if it does not exist.
    async fn update_appointment(&self, id: Uuid, appointment: &Appointment)
        -> Result<bool, AppError>;

    /// Write only the Google event ID of appointment `id`, leaving every other
    /// field as stored. Returns `false` if it does not exist.
    async fn set_google_event_id(&self, id: Uuid, event_id: Option<&str>)
        -> Result<bool, AppError>;

    /// Remove appointment `id`. Returns `false` if it did not exist.
    async fn delete_appointment(&self, id: Uuid) -> Result<bool, AppError>;

    /// All appointments of a dietician, ordered by start ascending.
    async fn list_appointments_for_owner(&self, owner: Uuid)
        -> Result<Vec<Appointment>, AppError>;

    /// Appointments of a dietician starting within `range`, ordered by start ascending.
    async fn list_appointments_in_range(
        &self,
        owner: Uuid,
        range: DateRange,
    ) -> Result<Vec<Appointment>, AppError>;
}

/// User and Google credential persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    /// Store a token pair. Returns `false` if the user does not exist.
    async fn set_google_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Remove all Google credentials. Returns `false` if the user does not exist.
    async fn clear_google_tokens(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Combined store handed to services.
pub trait Store: AppointmentStore + UserStore {}

impl<T: AppointmentStore + UserStore> Store for T {}

/// Half-open UTC interval `[from 00:00, to + 1 day 00:00)` built from two dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end_exclusive: DateTime<Utc>,
}

impl DateRange {
    /// Build the range covering both dates inclusively; inverted bounds are swapped.
    pub fn from_dates(from: NaiveDate, to: NaiveDate) -> Self {
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        let end_day = to.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        Self {
            start: start_of_day_utc(from),
            end_exclusive: start_of_day_utc(end_day),
        }
    }

    /// A single calendar day.
    pub fn day(date: NaiveDate) -> Self {
        Self::from_dates(date, date)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end_exclusive
    }
}
