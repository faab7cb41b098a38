//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dietician account with the Google credential subset used for calendar sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Google OAuth access token
    #[serde(default)]
    pub google_access_token: Option<String>,
    /// Google OAuth refresh token
    #[serde(default)]
    pub google_refresh_token: Option<String>,
    /// When the access token expires
    #[serde(default)]
    pub google_token_expiry: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: Uuid, username: &str, email: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
            google_access_token: None,
            google_refresh_token: None,
            google_token_expiry: None,
        }
    }

    /// Both tokens are stored (the access token may already be expired).
    pub fn has_google_credentials(&self) -> bool {
        non_empty(&self.google_access_token) && non_empty(&self.google_refresh_token)
    }

    /// Both tokens stored and the access token has not expired at `now`.
    pub fn is_google_calendar_connected_at(&self, now: DateTime<Utc>) -> bool {
        self.has_google_credentials() && self.google_token_expiry.is_some_and(|exp| exp > now)
    }

    pub fn is_google_calendar_connected(&self) -> bool {
        self.is_google_calendar_connected_at(Utc::now())
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}
