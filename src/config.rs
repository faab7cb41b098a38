// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Google OAuth settings are optional at startup. Code paths that need them
//! report a configuration error when they are missing, so the rest of the
//! API keeps working on deployments without a Google integration.

use std::env;

pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
pub const DEFAULT_GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Which store backs the appointment and user accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND")),
        }
    }
}

/// Google OAuth client and endpoint settings.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub calendar_api_url: String,
}

impl GoogleConfig {
    /// Point every Google endpoint at `base_url` (used with mock servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.auth_url = format!("{}/o/oauth2/v2/auth", base);
        self.token_url = format!("{}/token", base);
        self.revoke_url = format!("{}/revoke", base);
        self.calendar_api_url = format!("{}/calendar/v3", base);
        self
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL (CORS allow-list)
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub google: GoogleConfig,

    /// JWT verification key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            google: GoogleConfig {
                client_id: optional_var("GOOGLE_CLIENT_ID"),
                client_secret: optional_var("GOOGLE_CLIENT_SECRET"),
                redirect_uri: optional_var("GOOGLE_REDIRECT_URI"),
                auth_url: env::var("GOOGLE_AUTH_URL")
                    .unwrap_or_else(|_| DEFAULT_GOOGLE_AUTH_URL.to_string()),
                token_url: env::var("GOOGLE_TOKEN_URL")
                    .unwrap_or_else(|_| DEFAULT_GOOGLE_TOKEN_URL.to_string()),
                revoke_url: env::var("GOOGLE_REVOKE_URL")
                    .unwrap_or_else(|_| DEFAULT_GOOGLE_REVOKE_URL.to_string()),
                calendar_api_url: env::var("GOOGLE_CALENDAR_API_URL")
                    .unwrap_or_else(|_| DEFAULT_GOOGLE_CALENDAR_API_URL.to_string()),
            },
            jwt_signing_key,
            oauth_state_key,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            google: GoogleConfig {
                client_id: Some("test-client-id.apps.googleusercontent.com".to_string()),
                client_secret: Some("test_client_secret".to_string()),
                redirect_uri: Some("http://localhost:5173/integrations/google/callback".to_string()),
                auth_url: DEFAULT_GOOGLE_AUTH_URL.to_string(),
                token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
                revoke_url: DEFAULT_GOOGLE_REVOKE_URL.to_string(),
                calendar_api_url: DEFAULT_GOOGLE_CALENDAR_API_URL.to_string(),
            },
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }
}

/// Read an env var, treating empty/whitespace values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
