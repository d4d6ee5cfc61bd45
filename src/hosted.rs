//! Hosted backend client: password auth, token refresh, logout and the
//! contact-message insert, over the provider's REST endpoints.

use std::sync::Mutex;

use serde::Deserialize;
use tokio::sync::broadcast;
use url::Url;

use crate::clock;
use crate::error::Error;
use crate::guard::{AuthProvider, BoxError, RecordStore};
use crate::storage::Storage;
use crate::types::{AuthEvent, AuthUser, ContactMessage, Email, Session};

/// Storage key the session is persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "supabase.auth.token";

const CONTACT_TABLE: &str = "contact_messages";

/// Connection settings for the hosted backend.
///
/// ```rust,ignore
/// let config = HostedConfig::new("https://xyz.supabase.co".parse()?, anon_key)
///     .with_storage_key("portfolio.session");
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct HostedConfig {
    pub(crate) url: Url,
    pub(crate) anon_key: String,
    pub(crate) storage_key: String,
}

impl std::fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"***")
            .field("storage_key", &self.storage_key)
            .finish()
    }
}

impl HostedConfig {
    #[must_use]
    pub fn new(url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            url,
            anon_key: anon_key.into(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
        }
    }

    /// Load from `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either variable is missing or blank, or the
    /// URL does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let url = required_env("SUPABASE_URL")?;
        let url = url
            .parse::<Url>()
            .map_err(|e| Error::Config(format!("SUPABASE_URL: {e}")))?;
        let anon_key = required_env("SUPABASE_ANON_KEY")?;
        Ok(Self::new(url, anon_key))
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.url
            .join(path)
            .map_err(|e| Error::Config(format!("{path}: {e}")))
    }

    fn token_url(&self, grant_type: &str) -> Result<Url, Error> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }
}

fn required_env(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!("{name} must be set"))),
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now.saturating_add(self.expires_in.unwrap_or(0)));
        let session = Session::new(self.access_token, expires_at, self.user);
        match self.refresh_token {
            Some(token) => session.with_refresh_token(token),
            None => session,
        }
    }
}

/// [`AuthProvider`] and [`RecordStore`] backed by the hosted service.
///
/// The session lives in memory and in `storage`, so a new backend over the
/// same storage picks up where the previous one left off.
pub struct HostedBackend<S> {
    config: HostedConfig,
    http: reqwest::Client,
    storage: S,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl<S: Storage> HostedBackend<S> {
    #[must_use]
    pub fn new(config: HostedConfig, storage: S) -> Self {
        let session = restore(&storage, &config.storage_key);
        let (events, _) = broadcast::channel(32);
        Self {
            config,
            http: reqwest::Client::new(),
            storage,
            session: Mutex::new(session),
            events,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    fn current(&self) -> Option<Session> {
        match self.session.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn persist(&self, session: Option<&Session>) -> Result<(), Error> {
        match self.session.lock() {
            Ok(mut slot) => *slot = session.cloned(),
            Err(poisoned) => *poisoned.into_inner() = session.cloned(),
        }
        let key = &self.config.storage_key;
        match session {
            Some(session) => {
                let json =
                    serde_json::to_string(session).map_err(|e| Error::Storage(e.to_string()))?;
                self.storage.set(key, &json)
            }
            None => self.storage.remove(key),
        }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        operation: &'static str,
    ) -> Result<Session, Error> {
        let response = self
            .http
            .post(self.config.token_url(grant_type)?)
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, operation).await?;
        let token = response.json::<TokenResponse>().await?;
        Ok(token.into_session(clock::now_unix()))
    }
}

fn restore<S: Storage>(storage: &S, key: &str) -> Option<Session> {
    match storage.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, key, "Discarding unreadable persisted session");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, key, "Persisted session unavailable");
            None
        }
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Backend {
        operation,
        status: Some(status),
        detail: body,
    })
}

impl<S: Storage + 'static> AuthProvider for HostedBackend<S> {
    async fn get_session(&self) -> Result<Option<Session>, BoxError> {
        Ok(self.current())
    }

    async fn refresh_session(&self) -> Result<Session, BoxError> {
        let refresh_token = self
            .current()
            .and_then(|session| session.refresh_token)
            .ok_or_else(|| Error::Backend {
                operation: "session refresh",
                status: None,
                detail: "no refresh token".into(),
            })?;

        let body = serde_json::json!({ "refresh_token": refresh_token.as_str() });
        let session = self
            .token_grant("refresh_token", body, "session refresh")
            .await?;
        self.persist(Some(&session))?;

        tracing::info!(user_id = %session.user.id, expires_at = session.expires_at, "Session refreshed");
        self.emit(AuthEvent::TokenRefreshed(Some(session.clone())));
        Ok(session)
    }

    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<Session, BoxError> {
        let body = serde_json::json!({ "email": email.as_str(), "password": password });
        let session = self.token_grant("password", body, "password sign-in").await?;
        self.persist(Some(&session))?;

        tracing::info!(user_id = %session.user.id, "Signed in");
        self.emit(AuthEvent::SignedIn(Some(session.clone())));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BoxError> {
        let token = self.current().map(|session| session.access_token);

        // The local session is gone even if the remote revoke fails.
        let cleared = self.persist(None);
        self.emit(AuthEvent::SignedOut);

        if let Some(token) = token {
            let response = self
                .http
                .post(self.config.endpoint("auth/v1/logout")?)
                .header("apikey", &self.config.anon_key)
                .bearer_auth(token.as_str())
                .send()
                .await
                .map_err(Error::from)?;
            ensure_success(response, "logout").await?;
        }
        cleared?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

impl<S: Storage + 'static> RecordStore for HostedBackend<S> {
    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BoxError> {
        let url = self.config.endpoint(&format!("rest/v1/{CONTACT_TABLE}"))?;
        let bearer = self
            .current()
            .map_or_else(|| self.config.anon_key.clone(), |s| s.access_token.0);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(bearer)
            .json(message)
            .send()
            .await
            .map_err(Error::from)?;
        ensure_success(response, "contact insert").await?;

        tracing::debug!(table = CONTACT_TABLE, "Record inserted");
        Ok(())
    }
}
