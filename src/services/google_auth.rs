// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client and token broker.
//!
//! Handles:
//! - Authorization URL construction with a signed `state` parameter
//! - Code exchange on the OAuth callback
//! - Token refresh when expiring (5-minute margin)
//! - Revocation on disconnect

use crate::config::GoogleConfig;
use crate::db::Store;
use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// OAuth scope granting read/write access to the user's calendars.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when Google omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Timeout applied to every outbound Google request.
pub const GOOGLE_HTTP_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client shared by the OAuth and Calendar clients.
pub fn build_http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(GOOGLE_HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success Google response onto `AppError::GoogleApi`.
///
/// A 404 becomes [`AppError::GoogleNotFound`] so callers can tell a missing
/// resource apart from other failures.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::GoogleNotFound);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::GoogleApi(format!("HTTP {}: {}", status, body)))
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl GoogleTokenResponse {
    /// Absolute expiry computed from `expires_in`, defaulting to one hour.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
    }
}

/// Low-level Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuthClient {
    pub fn new(http: reqwest::Client, config: GoogleConfig) -> Self {
        Self { http, config }
    }

    fn client_credentials(&self) -> Result<(&str, &str), AppError> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AppError::Configuration(
                "Google OAuth client credentials not configured".to_string(),
            )),
        }
    }

    fn redirect_uri(&self) -> Result<&str, AppError> {
        self.config.redirect_uri.as_deref().ok_or_else(|| {
            AppError::Configuration("Google OAuth redirect URI not configured".to_string())
        })
    }

    /// Build the consent-screen URL for `state`.
    pub fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let client_id = self.config.client_id.as_deref().ok_or_else(|| {
            AppError::Configuration("Google OAuth client ID not configured".to_string())
        })?;
        let redirect_uri = self.redirect_uri()?;

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}&access_type=offline&prompt=consent",
            self.config.auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokenResponse, AppError> {
        let (client_id, client_secret) = self.client_credentials()?;
        let redirect_uri = self.redirect_uri()?;

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token exchange failed: {}", e)))?;

        check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<GoogleTokenResponse, AppError> {
        let (client_id, client_secret) = self.client_credentials()?;

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token refresh request failed: {}", e)))?;

        check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Failed to parse token response: {}", e)))
    }

    /// Revoke a token, invalidating the whole grant.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.config.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Revocation request failed: {}", e)))?;

        check_response(response).await?;
        tracing::info!("Google token revocation successful");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GoogleAuthService - token broker with refresh management
// ─────────────────────────────────────────────────────────────────────────────

/// Shared refresh locks type.
pub type RefreshLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Outcome of the OAuth callback or a disconnect.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionResult {
    pub success: bool,
    pub message: String,
}

impl ConnectionResult {
    fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_string(),
        }
    }
}

/// Google Calendar connection state for the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub connected_date: Option<DateTime<Utc>>,
}

/// Token broker: owns the OAuth lifecycle of each user's Google credentials.
///
/// Remote failures are logged and reported as `None`/`false`. Only missing
/// OAuth configuration surfaces as an error, from [`Self::authorization_url`].
#[derive(Clone)]
pub struct GoogleAuthService {
    client: GoogleOAuthClient,
    store: Arc<dyn Store>,
    state_key: Vec<u8>,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl GoogleAuthService {
    pub fn new(client: GoogleOAuthClient, store: Arc<dyn Store>, state_key: Vec<u8>) -> Self {
        Self {
            client,
            store,
            state_key,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Authorization ───────────────────────────────────────────────────────

    /// URL that sends `user_id` through Google's consent screen.
    pub fn authorization_url(&self, user_id: Uuid) -> Result<String, AppError> {
        let state = self.sign_state(user_id, Utc::now().timestamp_millis())?;
        self.client.authorization_url(&state)
    }

    /// Encode `user_id|timestamp_hex|signature_hex` as URL-safe base64.
    fn sign_state(&self, user_id: Uuid, timestamp_ms: i64) -> Result<String, AppError> {
        let payload = format!("{}|{:x}", user_id, timestamp_ms);
        let signature = sign_payload(&self.state_key, &payload)?;
        Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
    }

    /// Verify a `state` parameter and return the user it was issued for.
    pub fn verify_state(&self, state: &str) -> Option<Uuid> {
        let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
        let decoded = String::from_utf8(bytes).ok()?;

        let parts: Vec<&str> = decoded.splitn(3, '|').collect();
        let [user_id, timestamp_hex, signature_hex] = parts[..] else {
            return None;
        };

        let payload = format!("{}|{}", user_id, timestamp_hex);
        let expected = sign_payload(&self.state_key, &payload).ok()?;

        if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
            tracing::warn!("OAuth state signature mismatch");
            return None;
        }

        Uuid::parse_str(user_id).ok()
    }

    /// Exchange `code` and store the resulting tokens for `user_id`.
    pub async fn handle_oauth_callback(&self, code: &str, user_id: Uuid) -> ConnectionResult {
        let tokens = match self.client.exchange_code(code).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "Google token exchange failed");
                return ConnectionResult::new(false, "Failed to exchange code for tokens");
            }
        };

        let expiry = tokens.expiry_from(Utc::now());
        // Without a refresh token the user is not considered connected.
        let refresh_token = tokens.refresh_token.as_deref().unwrap_or_default();
        if refresh_token.is_empty() {
            tracing::warn!(user_id = %user_id, "Google returned no refresh token");
        }

        match self
            .store
            .set_google_tokens(user_id, &tokens.access_token, refresh_token, expiry)
            .await
        {
            Ok(true) => {
                tracing::info!(user_id = %user_id, expiry = %expiry, "Google Calendar connected");
                ConnectionResult::new(true, "Google Calendar connected successfully")
            }
            Ok(false) => {
                tracing::warn!(user_id = %user_id, "Cannot store Google tokens for unknown user");
                ConnectionResult::new(false, "Failed to save tokens")
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "Failed to store Google tokens");
                ConnectionResult::new(false, "Failed to save tokens")
            }
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a usable access token for `user_id`, refreshing it if it expires
    /// within five minutes.
    ///
    /// Returns `None` when the user is missing, has no refresh token, or the
    /// refresh fails.
    pub async fn get_valid_access_token(&self, user_id: Uuid) -> Option<String> {
        let user = self.load_user(user_id).await?;
        if let Some(token) = fresh_access_token(&user, Utc::now()) {
            return Some(token);
        }

        // Only one task per user performs the refresh; the others wait here.
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let user = self.load_user(user_id).await?;
        if let Some(token) = fresh_access_token(&user, Utc::now()) {
            return Some(token);
        }

        let Some(stored_refresh) = user.google_refresh_token.filter(|t| !t.is_empty()) else {
            tracing::debug!(user_id = %user_id, "No Google refresh token stored");
            return None;
        };

        tracing::info!(user_id = %user_id, "Google access token expiring, refreshing");

        let tokens = self.refresh_token_direct(&stored_refresh).await?;
        let expiry = tokens.expiry_from(Utc::now());
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&stored_refresh);

        match self
            .store
            .set_google_tokens(user_id, &tokens.access_token, refresh_token, expiry)
            .await
        {
            Ok(true) => tracing::info!(user_id = %user_id, expiry = %expiry, "Google token refreshed"),
            Ok(false) => tracing::warn!(user_id = %user_id, "User vanished during token refresh"),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to persist refreshed token")
            }
        }

        Some(tokens.access_token)
    }

    /// Refresh `refresh_token` without touching stored state.
    pub async fn refresh_token_direct(&self, refresh_token: &str) -> Option<GoogleTokenResponse> {
        match self.client.refresh_token(refresh_token).await {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::warn!(error = %e, "Google token refresh failed");
                None
            }
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Option<crate::models::User> {
        match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to load user for token lookup");
                None
            }
        }
    }

    // ─── Status / Disconnect ─────────────────────────────────────────────────

    pub async fn connection_status(&self, user_id: Uuid) -> Result<ConnectionStatus, AppError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(ConnectionStatus::default());
        };

        Ok(ConnectionStatus {
            is_connected: user.is_google_calendar_connected(),
            connected_date: user
                .google_token_expiry
                .map(|exp| exp - Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)),
        })
    }

    /// Revoke the grant at Google (best effort) and clear stored tokens.
    ///
    /// Returns `false` if the user does not exist.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<bool, AppError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(false);
        };

        let token = user
            .google_refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(user.google_access_token.as_deref().filter(|t| !t.is_empty()));

        if let Some(token) = token {
            if let Err(e) = self.client.revoke(token).await {
                tracing::warn!(error = %e, user_id = %user_id, "Google revocation failed, clearing tokens anyway");
            }
        }

        let cleared = self.store.clear_google_tokens(user_id).await?;
        tracing::info!(user_id = %user_id, "Google Calendar disconnected");
        Ok(cleared)
    }
}

fn sign_payload(key: &[u8], payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn fresh_access_token(user: &crate::models::User, now: DateTime<Utc>) -> Option<String> {
    let expiry = user.google_token_expiry?;
    let token = user.google_access_token.as_deref().filter(|t| !t.is_empty())?;
    (expiry > now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)).then(|| token.to_string())
}
