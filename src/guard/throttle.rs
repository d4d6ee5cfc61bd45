use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use super::config::GuardConfig;
use super::error::GuardError;
use super::traits::AuthProvider;
use crate::clock;
use crate::countdown::Countdown;
use crate::types::{Email, Session};

/// Lockout threshold and duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl LoginPolicy {
    #[must_use]
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            max_attempts: config.max_login_attempts(),
            lockout: config.lockout(),
        }
    }
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}

/// Whether a login attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginGate {
    Open,
    Locked { remaining_secs: u64 },
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempts left before lockout.
    Remaining(u32),
    /// This failure triggered a lockout of `lockout_secs`.
    LockedOut { lockout_secs: u64 },
}

/// Consecutive failed logins for this client, kept in memory only.
///
/// Resets on success and when a lockout elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAttempts {
    failures: u32,
    /// Epoch seconds when the active lockout ends.
    locked_until: Option<i64>,
}

impl LoginAttempts {
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn locked_until(&self) -> Option<i64> {
        self.locked_until
    }

    /// Check whether an attempt may proceed at `now` (epoch seconds).
    ///
    /// An elapsed lockout is cleared here, together with the failure count.
    pub fn gate(&mut self, now: i64) -> LoginGate {
        match self.locked_until {
            Some(until) if now < until => LoginGate::Locked {
                remaining_secs: until.saturating_sub(now).unsigned_abs(),
            },
            Some(_) => {
                *self = Self::default();
                LoginGate::Open
            }
            None => LoginGate::Open,
        }
    }

    pub fn record_failure(&mut self, policy: &LoginPolicy, now: i64) -> FailureOutcome {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= policy.max_attempts {
            let lockout_secs = policy.lockout.as_secs();
            self.locked_until = Some(now.saturating_add_unsigned(lockout_secs));
            FailureOutcome::LockedOut { lockout_secs }
        } else {
            FailureOutcome::Remaining(policy.max_attempts - self.failures)
        }
    }

    pub fn record_success(&mut self) {
        *self = Self::default();
    }
}

/// Attempt counter plus the countdown shown while locked.
///
/// The lockout countdown clears the attempt state when it reaches zero.
#[derive(Debug)]
pub struct LoginThrottle {
    policy: LoginPolicy,
    attempts: Arc<Mutex<LoginAttempts>>,
    countdown: Countdown,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(policy: LoginPolicy) -> Self {
        Self {
            policy,
            attempts: Arc::new(Mutex::new(LoginAttempts::default())),
            countdown: Countdown::idle(),
        }
    }

    #[must_use]
    pub fn attempts(&self) -> LoginAttempts {
        *lock_attempts(&self.attempts)
    }

    /// Seconds-remaining ticks for the lockout banner; zero when unlocked.
    #[must_use]
    pub fn lockout_ticks(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    /// # Errors
    ///
    /// Returns [`GuardError::LockedOut`] while a lockout is active.
    pub fn check(&mut self, now: i64) -> Result<(), GuardError> {
        match lock_attempts(&self.attempts).gate(now) {
            LoginGate::Open => Ok(()),
            LoginGate::Locked { remaining_secs } => Err(GuardError::LockedOut { remaining_secs }),
        }
    }

    /// Record a rejected credential pair and return the message to show.
    ///
    /// Starts the lockout countdown when the threshold is reached, which
    /// requires a Tokio runtime.
    pub fn fail(&mut self, now: i64) -> GuardError {
        let (outcome, failures) = {
            let mut attempts = lock_attempts(&self.attempts);
            (attempts.record_failure(&self.policy, now), attempts.failures())
        };
        match outcome {
            FailureOutcome::Remaining(remaining) => GuardError::InvalidCredentials { remaining },
            FailureOutcome::LockedOut { lockout_secs } => {
                tracing::warn!(failures, lockout_secs, "Login locked after repeated failures");
                let attempts = Arc::clone(&self.attempts);
                self.countdown.restart_then(lockout_secs, move || {
                    lock_attempts(&attempts).record_success();
                    tracing::debug!("Login lockout elapsed");
                });
                GuardError::LockoutStarted { lockout_secs }
            }
        }
    }

    pub fn succeed(&mut self) {
        lock_attempts(&self.attempts).record_success();
        self.countdown.restart(0);
    }
}

fn lock_attempts(attempts: &Mutex<LoginAttempts>) -> MutexGuard<'_, LoginAttempts> {
    attempts.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The admin login view's submit logic.
pub struct LoginFlow<P> {
    provider: Arc<P>,
    throttle: LoginThrottle,
    dashboard_path: String,
}

impl<P: AuthProvider> LoginFlow<P> {
    pub fn new(provider: Arc<P>, config: &GuardConfig) -> Self {
        Self {
            provider,
            throttle: LoginThrottle::new(LoginPolicy::from_config(config)),
            dashboard_path: config.dashboard_path().to_string(),
        }
    }

    #[must_use]
    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    #[must_use]
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    /// A live session means the visitor should skip the form and go to the dashboard.
    pub async fn existing_session(&self) -> Option<Session> {
        match self.provider.get_session().await {
            Ok(Some(session)) if !session.is_expired_at(clock::now_unix()) => Some(session),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup on login view failed");
                None
            }
        }
    }

    /// # Errors
    ///
    /// See [`login_at`](Self::login_at).
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Session, GuardError> {
        self.login_at(email, password, clock::now_unix()).await
    }

    /// Submit credentials at `now` (epoch seconds).
    ///
    /// While locked out the provider is never contacted. Blank or malformed
    /// input is rejected locally and does not count as a failed attempt.
    ///
    /// # Errors
    ///
    /// - [`GuardError::LockedOut`] while a lockout is active
    /// - [`GuardError::MissingCredentials`] / [`GuardError::InvalidEmail`] for bad input
    /// - [`GuardError::InvalidCredentials`] with the attempts left
    /// - [`GuardError::LockoutStarted`] when this failure triggered a lockout
    pub async fn login_at(
        &mut self,
        email: &str,
        password: &str,
        now: i64,
    ) -> Result<Session, GuardError> {
        self.throttle.check(now)?;

        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(GuardError::MissingCredentials);
        }
        let email: Email = email.parse().map_err(|_| GuardError::InvalidEmail)?;

        match self.provider.sign_in_with_password(&email, password).await {
            Ok(session) => {
                self.throttle.succeed();
                tracing::info!(user_id = %session.user.id, "Admin login successful");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Admin login rejected");
                Err(self.throttle.fail(now))
            }
        }
    }
}
