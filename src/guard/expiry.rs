//! Session expiry warning.
//!
//! ```text
//! Idle ──(lead time before expiry)──▶ Warning ──extend() ok──▶ Idle
//!                                      │  └─extend() err──▶ Warning
//!                                      └──(expiry) / logout_now()──▶ LoggedOut
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant};

use super::config::GuardConfig;
use super::error::GuardError;
use super::traits::AuthProvider;
use crate::clock;
use crate::countdown::{Countdown, ScopedTask};
use crate::types::{AuthEvent, Session};

/// What the warning overlay should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnerState {
    /// No session to watch (not yet loaded, or none exists).
    Inactive,
    /// Session is healthy; warning scheduled ahead of `expires_at`.
    Idle { expires_at: i64 },
    /// Expiry is near; `remaining_secs` ticks down once per second.
    Warning { remaining_secs: u64 },
    /// Signed out, either by expiry or by request.
    LoggedOut,
}

/// Timers to arm for a session, computed from its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPlan {
    /// Warn after `warn_in`, force logout after `expire_in`.
    WarnLater { warn_in: Duration, expire_in: Duration },
    /// Already inside the warning window.
    WarnNow { expire_in: Duration },
    /// Expiry is at or before now: log out immediately.
    ExpireNow,
}

impl ExpiryPlan {
    #[must_use]
    pub fn compute(expires_at: i64, now: i64, lead: Duration) -> Self {
        let remaining = expires_at.saturating_sub(now);
        if remaining <= 0 {
            return Self::ExpireNow;
        }
        let expire_in = Duration::from_secs(remaining.unsigned_abs());
        match expire_in.checked_sub(lead) {
            Some(warn_in) if !warn_in.is_zero() => Self::WarnLater { warn_in, expire_in },
            _ => Self::WarnNow { expire_in },
        }
    }
}

enum Command {
    Extend(oneshot::Sender<Result<i64, GuardError>>),
    LogoutNow(oneshot::Sender<()>),
}

/// Background watcher that warns before a session expires and logs out at expiry.
///
/// All timers belong to this value; dropping it cancels them.
#[derive(Debug)]
pub struct ExpiryWarner {
    state: watch::Receiver<WarnerState>,
    commands: mpsc::Sender<Command>,
    login_path: String,
    _task: ScopedTask,
}

impl ExpiryWarner {
    pub fn start<P: AuthProvider>(provider: Arc<P>, config: &GuardConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(WarnerState::Inactive);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let events = provider.subscribe();

        let worker = Worker {
            provider,
            lead: config.warning_lead(),
            state: state_tx,
            expire_at: None,
            warn_at: None,
            countdown: None,
            ticks: None,
        };
        let task = ScopedTask::spawn(worker.run(cmd_rx, events));

        Self {
            state: state_rx,
            commands: cmd_tx,
            login_path: config.login_path().to_string(),
            _task: task,
        }
    }

    #[must_use]
    pub fn state(&self) -> WarnerState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WarnerState> {
        self.state.clone()
    }

    /// Refresh the session and return to `Idle` with the new expiry.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::RefreshFailed`] if the provider cannot refresh;
    /// the warning stays up so the user may retry or log out.
    pub async fn extend(&self) -> Result<i64, GuardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Extend(reply))
            .await
            .map_err(|_| GuardError::RefreshFailed)?;
        rx.await.map_err(|_| GuardError::RefreshFailed)?
    }

    /// Sign out now and return the login path to navigate to.
    pub async fn logout_now(&self) -> &str {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::LogoutNow(reply)).await.is_ok() {
            let _ = rx.await;
        }
        &self.login_path
    }
}

struct Worker<P> {
    provider: Arc<P>,
    lead: Duration,
    state: watch::Sender<WarnerState>,
    expire_at: Option<Instant>,
    warn_at: Option<Instant>,
    countdown: Option<Countdown>,
    ticks: Option<watch::Receiver<u64>>,
}

impl<P: AuthProvider> Worker<P> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: broadcast::Receiver<AuthEvent>,
    ) {
        match self.provider.get_session().await {
            Ok(Some(session)) => self.schedule(&session).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not load session for expiry warning"),
        }

        let mut events_open = true;
        loop {
            tokio::select! {
                () = sleep_until(self.warn_at) => {
                    self.warn_at = None;
                    self.enter_warning();
                }
                () = sleep_until(self.expire_at) => {
                    tracing::info!("Session expired, logging out");
                    self.log_out().await;
                }
                Some(left) = next_tick(&mut self.ticks) => {
                    self.state.send_replace(WarnerState::Warning { remaining_secs: left });
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::Extend(reply)) => {
                        let result = self.extend().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::LogoutNow(reply)) => {
                        tracing::info!("Logout requested from expiry warning");
                        self.log_out().await;
                        let _ = reply.send(());
                    }
                    None => return,
                },
                event = events.recv(), if events_open => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => self.reload().await,
                    Err(broadcast::error::RecvError::Closed) => events_open = false,
                },
            }
        }
    }

    async fn schedule(&mut self, session: &Session) {
        self.clear_timers();
        match ExpiryPlan::compute(session.expires_at, clock::now_unix(), self.lead) {
            ExpiryPlan::ExpireNow => {
                tracing::warn!(expires_at = session.expires_at, "Session already expired");
                self.log_out().await;
            }
            ExpiryPlan::WarnNow { expire_in } => {
                self.expire_at = Some(Instant::now() + expire_in);
                self.enter_warning();
            }
            ExpiryPlan::WarnLater { warn_in, expire_in } => {
                tracing::debug!(
                    warn_in_secs = warn_in.as_secs(),
                    expire_in_secs = expire_in.as_secs(),
                    "Session expiry timers armed"
                );
                let now = Instant::now();
                self.warn_at = Some(now + warn_in);
                self.expire_at = Some(now + expire_in);
                self.state.send_replace(WarnerState::Idle {
                    expires_at: session.expires_at,
                });
            }
        }
    }

    fn enter_warning(&mut self) {
        let remaining_secs = self
            .expire_at
            .map_or(0, |at| at.saturating_duration_since(Instant::now()).as_secs());
        tracing::warn!(remaining_secs, "Session about to expire");
        let countdown = Countdown::start(remaining_secs);
        self.ticks = Some(countdown.subscribe());
        self.countdown = Some(countdown);
        self.state.send_replace(WarnerState::Warning { remaining_secs });
    }

    async fn extend(&mut self) -> Result<i64, GuardError> {
        match self.provider.refresh_session().await {
            Ok(session) => {
                tracing::info!(expires_at = session.expires_at, "Session extended");
                self.schedule(&session).await;
                Ok(session.expires_at)
            }
            Err(e) => {
                tracing::error!(error = %e, "Session refresh failed");
                Err(GuardError::RefreshFailed)
            }
        }
    }

    async fn on_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(Some(session)) | AuthEvent::TokenRefreshed(Some(session)) => {
                self.schedule(&session).await;
            }
            AuthEvent::SignedIn(None) | AuthEvent::TokenRefreshed(None) => self.reload().await,
            AuthEvent::SignedOut | AuthEvent::PasswordRecovery => {
                self.clear_timers();
                self.state.send_replace(WarnerState::LoggedOut);
            }
        }
    }

    async fn reload(&mut self) {
        match self.provider.get_session().await {
            Ok(Some(session)) => self.schedule(&session).await,
            Ok(None) => {
                self.clear_timers();
                self.state.send_replace(WarnerState::LoggedOut);
            }
            Err(e) => tracing::warn!(error = %e, "Could not reload session"),
        }
    }

    async fn log_out(&mut self) {
        self.clear_timers();
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "Sign-out failed; local session treated as ended");
        }
        self.state.send_replace(WarnerState::LoggedOut);
    }

    fn clear_timers(&mut self) {
        self.warn_at = None;
        self.expire_at = None;
        self.countdown = None;
        self.ticks = None;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticks: &mut Option<watch::Receiver<u64>>) -> Option<u64> {
    match ticks {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}
