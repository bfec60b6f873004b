//! REST gateway against the hosted backend platform.
//!
//! Implements [`AuthGateway`] and [`ProfileRepository`] over the
//! platform's HTTP surface: the `auth/v1` endpoints for the credential
//! lifecycle and the `rest/v1` row API for profiles. Sessions are
//! persisted as JSON through a pluggable [`SessionStorage`] and restored
//! (then announced on the change broadcast) at client start.
//!
//! # Error classification
//!
//! The platform ships a structured `error_code` on newer deployments and
//! free-text messages on older ones. Classification prefers the code and
//! falls back to substring matching — the fallback is best-effort UX, not
//! a contract.

use crate::config::AccountConfig;
use crate::error::{AccountError, Result};
use crate::providers::{AuthGateway, AuthUser, NewAccount, Profile, ProfilePatch, ProfileRepository, SessionStorage};
use crate::state::{Session, UserId};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Gateway over the hosted platform's HTTP API.
///
/// Cheap to clone; all shared state lives behind `Arc`s.
#[derive(Debug, Clone)]
pub struct RestGateway<K>
where
    K: SessionStorage + Clone,
{
    config: AccountConfig,
    http: Client,
    storage: K,
    current: Arc<Mutex<Option<Session>>>,
    changes: broadcast::Sender<Option<Session>>,
}

impl<K> RestGateway<K>
where
    K: SessionStorage + Clone,
{
    /// Create a gateway from configuration and a storage backend.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Backend` if the HTTP client cannot be built.
    pub fn new(config: AccountConfig, storage: K) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccountError::Backend(e.to_string()))?;
        let (changes, _) = broadcast::channel(16);

        Ok(Self {
            config,
            http,
            storage,
            current: Arc::new(Mutex::new(None)),
            changes,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.trimmed_base_url())
    }

    fn profiles_url(&self) -> String {
        format!("{}/rest/v1/profiles", self.config.trimmed_base_url())
    }

    /// Bearer token for row-API calls: the session token when signed in,
    /// the publishable key otherwise.
    fn bearer(&self) -> String {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|s| s.access_token.clone()))
            .unwrap_or_else(|| self.config.publishable_key.clone())
    }

    /// Replace the held session atomically and notify subscribers.
    fn announce(&self, session: Option<Session>) {
        if let Ok(mut current) = self.current.lock() {
            *current = session.clone();
        }
        let _ = self.changes.send(session);
    }

    async fn persist(&self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(json) => {
                if let Err(error) = self.storage.set(&self.config.storage_key, &json).await {
                    tracing::warn!(%error, "Failed to persist session");
                }
            }
            Err(error) => tracing::warn!(%error, "Failed to serialize session"),
        }
    }

    async fn clear_persisted(&self) {
        if let Err(error) = self.storage.remove(&self.config.storage_key).await {
            tracing::warn!(%error, "Failed to clear persisted session");
        }
    }
}

impl<K> AuthGateway for RestGateway<K>
where
    K: SessionStorage + Clone,
{
    async fn sign_up(&self, account: &NewAccount) -> Result<AuthUser> {
        let body = serde_json::json!({
            "email": account.email,
            "password": account.password,
            "data": {
                "username": account.username,
                "avatar_url": null,
                "bio": null,
            },
        });

        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(AccountError::SignUpRejected(error_body.detail().to_string()));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        auth_user_from(&value, &account.email)
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthUser> {
        let body = serde_json::json!({
            "type": "signup",
            "email": email,
            "token": code,
        });

        let response = self
            .http
            .post(self.auth_url("verify"))
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(classify_verify_error(&error_body));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        auth_user_from(&value, email)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(classify_sign_in_error(&error_body));
        }

        let wire: WireSession = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        let session = wire.into_session(email);
        self.persist(&session).await;
        self.announce(Some(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let token = self
            .current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|s| s.access_token.clone()));

        let Some(token) = token else {
            // Nothing to revoke
            self.announce(None);
            return Ok(());
        };

        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AccountError::SignOutFailed(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(AccountError::SignOutFailed(error_body.detail().to_string()));
        }

        self.clear_persisted().await;
        self.announce(None);

        Ok(())
    }

    async fn resend_signup_otp(&self, email: &str) -> Result<()> {
        let body = serde_json::json!({
            "type": "signup",
            "email": email,
        });

        let response = self
            .http
            .post(self.auth_url("resend"))
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(classify_resend_error(&error_body));
        }

        Ok(())
    }

    fn subscribe_changes(&self) -> Result<broadcast::Receiver<Option<Session>>> {
        Ok(self.changes.subscribe())
    }

    async fn restore_session(&self) -> Result<Option<Session>> {
        match self.storage.get(&self.config.storage_key).await {
            Ok(Some(json)) => match serde_json::from_str::<Session>(&json) {
                Ok(session) => {
                    self.announce(Some(session.clone()));
                    Ok(Some(session))
                }
                Err(error) => {
                    tracing::warn!(%error, "Discarding corrupted persisted session");
                    self.clear_persisted().await;
                    self.announce(None);
                    Ok(None)
                }
            },
            Ok(None) => {
                self.announce(None);
                Ok(None)
            }
            Err(error) => {
                self.announce(None);
                Err(error)
            }
        }
    }
}

impl<K> ProfileRepository for RestGateway<K>
where
    K: SessionStorage + Clone,
{
    async fn find_by_id(&self, id: UserId) -> Result<Option<Profile>> {
        let response = self
            .http
            .get(self.profiles_url())
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(self.bearer())
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(AccountError::Backend(error_body.detail().to_string()));
        }

        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let response = self
            .http
            .get(self.profiles_url())
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(self.bearer())
            .query(&[
                ("select", "*".to_string()),
                ("email", format!("eq.{email}")),
            ])
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(AccountError::Backend(error_body.detail().to_string()));
        }

        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, profile: &Profile) -> Result<Profile> {
        let response = self
            .http
            .post(self.profiles_url())
            .header("apikey", &self.config.publishable_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(profile)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let conflict_status = response.status() == reqwest::StatusCode::CONFLICT;
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            if conflict_status || error_body.is_unique_violation() {
                return Err(AccountError::ProfileConflict);
            }
            return Err(AccountError::Backend(error_body.detail().to_string()));
        }

        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next().unwrap_or_else(|| profile.clone()))
    }

    async fn update(&self, id: UserId, patch: &ProfilePatch) -> Result<Profile> {
        let mut body = serde_json::to_value(patch)
            .map_err(|e| AccountError::Backend(e.to_string()))?;
        if let Some(map) = body.as_object_mut() {
            map.insert(
                "updated_at".to_string(),
                serde_json::Value::String(Utc::now().to_rfc3339()),
            );
        }

        let response = self
            .http
            .patch(self.profiles_url())
            .header("apikey", &self.config.publishable_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .query(&[("id", format!("eq.{id}"))])
            .json(&body)
            .send()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let error_body = parse_error_body(&response.text().await.unwrap_or_default());
            return Err(AccountError::Backend(error_body.detail().to_string()));
        }

        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| AccountError::Backend(e.to_string()))?;

        rows.into_iter().next().ok_or(AccountError::ProfileNotFound)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Wire types and classification
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct WireUser {
    id: uuid::Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: WireUser,
}

impl WireSession {
    fn into_session(self, fallback_email: &str) -> Session {
        Session {
            user_id: UserId(self.user.id),
            email: self
                .user
                .email
                .unwrap_or_else(|| fallback_email.to_string()),
            email_confirmed: self.user.email_confirmed_at.is_some(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

/// Loose error body covering both the auth API ({`error_code`, `msg`}) and
/// the row API ({`code`, `message`}).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn detail(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("request failed")
    }

    fn is_unique_violation(&self) -> bool {
        matches!(&self.code, Some(serde_json::Value::String(code)) if code == "23505")
            || self.detail().contains("duplicate key")
    }
}

fn parse_error_body(body: &str) -> ErrorBody {
    serde_json::from_str(body).unwrap_or_default()
}

/// Extract a user object from a response that may be either the user
/// itself or a session wrapping one.
fn auth_user_from(value: &serde_json::Value, fallback_email: &str) -> Result<AuthUser> {
    let user_value = value.get("user").unwrap_or(value);
    let user: WireUser = serde_json::from_value(user_value.clone())
        .map_err(|e| AccountError::Backend(format!("unexpected user payload: {e}")))?;

    Ok(AuthUser {
        user_id: UserId(user.id),
        email: user.email.unwrap_or_else(|| fallback_email.to_string()),
        email_confirmed: user.email_confirmed_at.is_some(),
    })
}

/// Classify an OTP verification failure.
///
/// Prefers the structured `error_code`; the message substrings are a
/// best-effort fallback for deployments that predate the codes.
fn classify_verify_error(body: &ErrorBody) -> AccountError {
    if body.error_code.as_deref() == Some("otp_expired") {
        return AccountError::OtpExpired;
    }

    let detail = body.detail().to_lowercase();
    if detail.contains("expired") {
        AccountError::OtpExpired
    } else if detail.contains("invalid") {
        AccountError::OtpInvalid
    } else {
        AccountError::VerifyRejected(body.detail().to_string())
    }
}

fn classify_sign_in_error(body: &ErrorBody) -> AccountError {
    if body.error_code.as_deref() == Some("invalid_credentials")
        || body.detail().eq_ignore_ascii_case("invalid login credentials")
    {
        return AccountError::InvalidCredentials;
    }

    AccountError::SignInRejected(body.detail().to_string())
}

fn classify_resend_error(body: &ErrorBody) -> AccountError {
    if body.error_code.as_deref() == Some("over_email_send_rate_limit")
        || body.detail().contains("security purposes")
    {
        return AccountError::RateLimited;
    }

    AccountError::Backend(body.detail().to_string())
}
