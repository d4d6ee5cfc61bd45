//! Admin access guarding and public form throttling.
//!
//! Everything here sits on two consumer-provided seams: an [`AuthProvider`]
//! that owns sessions and an optional [`RecordStore`] for contact messages.
//! The `hosted` feature ships an implementation of both.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use folio_guard::guard::{ExpiryWarner, GuardConfig, LoginFlow, SessionGuard};
//!
//! let config = GuardConfig::from_env()?;
//!
//! // Protected view: render only once access is granted.
//! let mut guard = SessionGuard::watch(provider.clone());
//! if let Some(redirect) = guard.resolved().await.redirect(&config) {
//!     return navigate(redirect);
//! }
//!
//! // Banner before the session runs out.
//! let warner = ExpiryWarner::start(provider.clone(), &config);
//!
//! // Login view.
//! let mut login = LoginFlow::new(provider, &config);
//! login.login("admin@example.com", password).await?;
//! ```

mod config;
mod contact;
mod error;
mod expiry;
mod session;
mod throttle;
mod traits;

pub use config::GuardConfig;
pub use contact::{
    ContactDraft, ContactForm, EMAIL_MAX_CHARS, MESSAGE_MAX_CHARS, NAME_MAX_CHARS, StatusBanner,
    SubmitStatus, check_cooldown,
};
pub use error::{FormField, GuardError};
pub use expiry::{ExpiryPlan, ExpiryWarner, WarnerState};
pub use session::{
    Access, LoginRedirect, SessionCheck, SessionGuard, apply_event, check_access, logout,
};
pub use throttle::{FailureOutcome, LoginAttempts, LoginFlow, LoginGate, LoginPolicy, LoginThrottle};
pub use traits::{AuthProvider, BoxError, RecordStore};
