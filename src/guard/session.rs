use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::config::GuardConfig;
use super::error::GuardError;
use super::traits::{AuthProvider, BoxError};
use crate::clock;
use crate::countdown::ScopedTask;
use crate::types::{AuthEvent, Session};

/// Access decision for a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Check still pending; render a neutral placeholder, never protected content.
    Checking,
    Granted(Box<Session>),
    Denied,
}

impl Access {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Where a denied visitor is sent; `None` while checking or when granted.
    #[must_use]
    pub fn redirect(&self, config: &GuardConfig) -> Option<LoginRedirect> {
        matches!(self, Self::Denied).then(|| LoginRedirect {
            path: config.login_path().to_string(),
            reason: None,
        })
    }
}

/// Redirect to the login view, optionally tagged with a reason code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub path: String,
    pub reason: Option<&'static str>,
}

impl LoginRedirect {
    #[must_use]
    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Outcome of a session query, before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Valid(Session),
    /// A session exists but expired; it must be signed out.
    Stale,
    Missing,
    /// The query itself failed; treated as unauthenticated.
    Failed,
}

impl SessionCheck {
    /// Classify a `get_session` result at time `now` (epoch seconds).
    #[must_use]
    pub fn classify(result: Result<Option<Session>, &BoxError>, now: i64) -> Self {
        match result {
            Err(_) => Self::Failed,
            Ok(None) => Self::Missing,
            Ok(Some(session)) if session.is_expired_at(now) => Self::Stale,
            Ok(Some(session)) => Self::Valid(session),
        }
    }

    #[must_use]
    pub fn into_access(self) -> Access {
        match self {
            Self::Valid(session) => Access::Granted(Box::new(session)),
            Self::Stale | Self::Missing | Self::Failed => Access::Denied,
        }
    }
}

/// Fold one auth-state-change notification into an access decision.
///
/// The newest event always wins, regardless of what was decided before.
#[must_use]
pub fn apply_event(event: &AuthEvent, now: i64) -> Access {
    match event {
        AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => match session {
            Some(s) if !s.is_expired_at(now) => Access::Granted(Box::new(s.clone())),
            _ => Access::Denied,
        },
        AuthEvent::SignedOut | AuthEvent::PasswordRecovery => Access::Denied,
    }
}

/// Query the provider once and decide access, failing closed.
///
/// A stale session is signed out before denying.
pub async fn check_access<P: AuthProvider>(provider: &P, now: i64) -> Access {
    let result = provider.get_session().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Session check failed");
    }
    let check = SessionCheck::classify(result.as_ref().map(Clone::clone), now);

    if check == SessionCheck::Stale {
        tracing::warn!("Session expired, signing out");
        if let Err(e) = provider.sign_out().await {
            tracing::warn!(error = %e, "Sign-out of stale session failed");
        }
    }
    check.into_access()
}

/// Sign out explicitly and return the login path to navigate to.
///
/// # Errors
///
/// Returns [`GuardError::SignOutFailed`] if the provider rejects the sign-out;
/// the caller may retry.
pub async fn logout<'c, P: AuthProvider>(
    provider: &P,
    config: &'c GuardConfig,
) -> Result<&'c str, GuardError> {
    provider.sign_out().await.map_err(|e| {
        tracing::error!(error = %e, "Logout failed");
        GuardError::SignOutFailed
    })?;
    tracing::info!("Admin logged out");
    Ok(config.login_path())
}

/// Reactive route guard.
///
/// Checks the session once, then keeps the decision current by applying every
/// auth-state-change notification in arrival order. Dropping the guard stops
/// the listener.
///
/// ```rust,ignore
/// let mut guard = SessionGuard::watch(provider.clone());
/// match guard.resolved().await {
///     Access::Granted(_) => render_dashboard(),
///     denied => navigate(denied.redirect(&config).unwrap().path),
/// }
/// ```
#[derive(Debug)]
pub struct SessionGuard {
    access: watch::Receiver<Access>,
    _listener: ScopedTask,
}

impl SessionGuard {
    pub fn watch<P: AuthProvider>(provider: Arc<P>) -> Self {
        let (tx, rx) = watch::channel(Access::Checking);
        // Subscribe before the first query so no notification is missed.
        let events = provider.subscribe();
        let listener = ScopedTask::spawn(listen(provider, events, tx));
        Self {
            access: rx,
            _listener: listener,
        }
    }

    /// Latest decision; may still be [`Access::Checking`].
    #[must_use]
    pub fn access(&self) -> Access {
        self.access.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Access> {
        self.access.clone()
    }

    /// Wait for the first non-`Checking` decision.
    pub async fn resolved(&mut self) -> Access {
        match self
            .access
            .wait_for(|access| !matches!(access, Access::Checking))
            .await
        {
            Ok(access) => access.clone(),
            Err(_) => Access::Denied,
        }
    }
}

async fn listen<P: AuthProvider>(
    provider: Arc<P>,
    mut events: broadcast::Receiver<AuthEvent>,
    tx: watch::Sender<Access>,
) {
    let access = check_access(provider.as_ref(), clock::now_unix()).await;
    tx.send_replace(access);

    loop {
        match events.recv().await {
            Ok(event) => {
                let access = apply_event(&event, clock::now_unix());
                tracing::debug!(?event, granted = access.is_granted(), "Auth state changed");
                tx.send_replace(access);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Missed notifications; the provider's current session is authoritative.
                tracing::warn!(skipped, "Auth events lagged, re-checking session");
                let access = check_access(provider.as_ref(), clock::now_unix()).await;
                tx.send_replace(access);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
