//! Public contact form submission.
//!
//! # Evaluation order
//! ```text
//! draft
//!     → sanitize (trim, truncate, lowercase email)
//!     → email shape → name charset → spam scan
//!     → cooldown since last accepted submission (storage read)
//!     → RecordStore insert
//!     → persist new timestamp (storage write)
//! ```
//! Nothing reaches the network until every local check has passed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use super::config::GuardConfig;
use super::error::GuardError;
use super::traits::RecordStore;
use crate::clock;
use crate::countdown::ScopedTask;
use crate::security;
use crate::storage::Storage;
use crate::types::{ContactMessage, Email, MessageStatus};

pub const NAME_MAX_CHARS: usize = 100;
pub const EMAIL_MAX_CHARS: usize = 100;
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Raw form state as typed by the visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactDraft {
    /// Trim every field, truncate name, email and message, and lowercase the email.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            name: security::trim_truncate(&self.name, NAME_MAX_CHARS),
            email: security::trim_truncate(&self.email.to_lowercase(), EMAIL_MAX_CHARS),
            subject: self.subject.trim().to_string(),
            message: security::trim_truncate(&self.message, MESSAGE_MAX_CHARS),
        }
    }

    /// Validate an already-sanitized draft into a storable message.
    ///
    /// # Errors
    ///
    /// [`GuardError::InvalidEmail`], [`GuardError::InvalidName`] or
    /// [`GuardError::SpamDetected`], checked in that order.
    pub fn validate(&self) -> Result<ContactMessage, GuardError> {
        let email: Email = self.email.parse().map_err(|_| GuardError::InvalidEmail)?;
        if !security::is_valid_name(&self.name) {
            return Err(GuardError::InvalidName);
        }
        if security::has_spam_patterns(&self.message) {
            return Err(GuardError::SpamDetected);
        }
        Ok(ContactMessage {
            name: self.name.clone(),
            email,
            subject: self.subject.clone(),
            message: self.message.clone(),
            status: MessageStatus::Unread,
        })
    }
}

/// Reject if the last accepted submission was less than `cooldown` ago.
///
/// # Errors
///
/// Returns [`GuardError::CooldownActive`] with the seconds left (rounded up).
pub fn check_cooldown(
    last_submit_ms: Option<i64>,
    now_ms: i64,
    cooldown: Duration,
) -> Result<(), GuardError> {
    let Some(last) = last_submit_ms else {
        return Ok(());
    };
    let cooldown_ms = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
    let elapsed = now_ms.saturating_sub(last);
    if elapsed < cooldown_ms {
        let left_ms = cooldown_ms - elapsed.max(0);
        let remaining_secs = u64::try_from((left_ms + 999) / 1000).unwrap_or(0);
        return Err(GuardError::CooldownActive { remaining_secs });
    }
    Ok(())
}

/// Banner shown under the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Idle,
    Success,
    Error(GuardError),
}

/// Transient status banner that returns to `Idle` after a fixed time.
///
/// Showing a new status replaces the pending auto-clear.
#[derive(Debug)]
pub struct StatusBanner {
    status: Arc<watch::Sender<SubmitStatus>>,
    ttl: Duration,
    clear: Mutex<Option<ScopedTask>>,
}

impl StatusBanner {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = watch::channel(SubmitStatus::Idle);
        Self {
            status: Arc::new(tx),
            ttl,
            clear: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn status(&self) -> SubmitStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SubmitStatus> {
        self.status.subscribe()
    }

    /// Show `status` and schedule its auto-clear. Requires a Tokio runtime.
    pub fn show(&self, status: SubmitStatus) {
        self.status.send_replace(status);

        let tx = Arc::clone(&self.status);
        let ttl = self.ttl;
        let task = ScopedTask::spawn(async move {
            tokio::time::sleep(ttl).await;
            tx.send_replace(SubmitStatus::Idle);
        });
        // Replacing the old handle aborts its pending clear.
        match self.clear.lock() {
            Ok(mut slot) => *slot = Some(task),
            Err(poisoned) => *poisoned.into_inner() = Some(task),
        }
    }
}

/// Contact form submit logic bound to a record store and durable storage.
pub struct ContactForm<R, S> {
    store: Arc<R>,
    storage: S,
    cooldown: Duration,
    cooldown_key: String,
    banner: StatusBanner,
}

impl<R: RecordStore, S: Storage> ContactForm<R, S> {
    pub fn new(store: Arc<R>, storage: S, config: &GuardConfig) -> Self {
        Self {
            store,
            storage,
            cooldown: config.contact_cooldown(),
            cooldown_key: config.cooldown_key().to_string(),
            banner: StatusBanner::new(config.banner_ttl()),
        }
    }

    #[must_use]
    pub fn banner(&self) -> &StatusBanner {
        &self.banner
    }

    /// # Errors
    ///
    /// See [`submit_at`](Self::submit_at).
    pub async fn submit(&self, draft: &mut ContactDraft) -> Result<(), GuardError> {
        self.submit_at(draft, clock::now_millis()).await
    }

    /// Submit `draft` at `now_ms` (epoch millis).
    ///
    /// On success the draft is cleared. Every outcome is also shown on the banner.
    ///
    /// # Errors
    ///
    /// - validation errors from [`ContactDraft::validate`]
    /// - [`GuardError::CooldownActive`] within the cooldown window
    /// - [`GuardError::Internal`] if the cooldown record cannot be read
    /// - [`GuardError::SubmitFailed`] if the record store rejects the insert
    pub async fn submit_at(&self, draft: &mut ContactDraft, now_ms: i64) -> Result<(), GuardError> {
        let result = self.try_submit(draft, now_ms).await;
        match &result {
            Ok(()) => {
                *draft = ContactDraft::default();
                self.banner.show(SubmitStatus::Success);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Contact submission rejected");
                self.banner.show(SubmitStatus::Error(e.clone()));
            }
        }
        result
    }

    async fn try_submit(&self, draft: &ContactDraft, now_ms: i64) -> Result<(), GuardError> {
        let message = draft.sanitized().validate()?;

        check_cooldown(self.last_submit()?, now_ms, self.cooldown)?;

        self.store
            .insert_contact_message(&message)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Contact message insert failed");
                GuardError::SubmitFailed
            })?;

        // The message is stored; a lost timestamp only weakens the next cooldown.
        if let Err(e) = self.storage.set(&self.cooldown_key, &now_ms.to_string()) {
            tracing::warn!(error = %e, "Could not persist contact cooldown timestamp");
        }
        tracing::info!(email = %message.email, "Contact message submitted");
        Ok(())
    }

    fn last_submit(&self) -> Result<Option<i64>, GuardError> {
        let raw = self.storage.get(&self.cooldown_key)?;
        Ok(raw.and_then(|value| match value.trim().parse::<i64>() {
            Ok(ms) => Some(ms),
            Err(_) => {
                tracing::warn!(value = %value, "Ignoring unparsable contact cooldown timestamp");
                None
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::FakeRecordStore;

    const T0: i64 = 1_700_000_000_000;

    fn draft(name: &str, email: &str, message: &str) -> ContactDraft {
        ContactDraft {
            name: name.into(),
            email: email.into(),
            subject: "Project inquiry".into(),
            message: message.into(),
        }
    }

    fn form(store: Arc<FakeRecordStore>) -> ContactForm<FakeRecordStore, Arc<MemoryStorage>> {
        ContactForm::new(store, Arc::new(MemoryStorage::new()), &GuardConfig::default())
    }

    #[test]
    fn sanitize_trims_truncates_and_lowercases() {
        let raw = ContactDraft {
            name: format!("  {}  ", "a".repeat(150)),
            email: "  Jane@Example.COM ".into(),
            subject: format!("  {}  ", "s".repeat(500)),
            message: "m".repeat(2500),
        };
        let clean = raw.sanitized();
        assert_eq!(clean.name.chars().count(), 100);
        assert_eq!(clean.email, "jane@example.com");
        assert_eq!(clean.subject, "s".repeat(500), "subject is trimmed but never cut");
        assert_eq!(clean.message.chars().count(), 2000);
    }

    #[test]
    fn sanitize_is_idempotent_on_clean_input() {
        let clean = draft("Jane Doe", "jane@example.com", "Let's talk.");
        assert_eq!(clean.sanitized(), clean);
        assert_eq!(clean.sanitized().sanitized(), clean.sanitized());
    }

    #[test]
    fn validation_order_email_then_name_then_spam() {
        let bad_everything = draft("John123", "nope", "see http://x");
        assert_eq!(bad_everything.validate(), Err(GuardError::InvalidEmail));

        let bad_name = draft("John123", "john@x.com", "see http://x");
        assert_eq!(bad_name.validate(), Err(GuardError::InvalidName));

        let spam = draft("John Doe", "john@x.com", "see http://x");
        assert_eq!(spam.validate(), Err(GuardError::SpamDetected));

        let script = draft("John Doe", "john@x.com", "<script>alert(1)</script>");
        assert_eq!(script.validate(), Err(GuardError::SpamDetected));

        let ok = draft("John Doe", "john@x.com", "Hello there").validate().unwrap();
        assert_eq!(ok.status, MessageStatus::Unread);
    }

    #[test]
    fn cooldown_window() {
        let cooldown = Duration::from_secs(60);
        assert!(check_cooldown(None, T0, cooldown).is_ok());
        assert_eq!(
            check_cooldown(Some(T0), T0 + 59_999, cooldown),
            Err(GuardError::CooldownActive { remaining_secs: 1 })
        );
        assert_eq!(
            check_cooldown(Some(T0), T0 + 10_000, cooldown),
            Err(GuardError::CooldownActive { remaining_secs: 50 })
        );
        assert!(check_cooldown(Some(T0), T0 + 60_000, cooldown).is_ok());
    }

    #[tokio::test]
    async fn accepted_submission_is_stored_and_clears_draft() {
        let store = Arc::new(FakeRecordStore::default());
        let form = form(store.clone());
        let mut d = draft(" Jane Doe ", "Jane@Example.com", "I'd like a quote.");

        form.submit_at(&mut d, T0).await.unwrap();

        assert_eq!(d, ContactDraft::default());
        let inserted = store.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].name, "Jane Doe");
        assert_eq!(inserted[0].email.as_str(), "jane@example.com");
        assert_eq!(inserted[0].status, MessageStatus::Unread);
        assert_eq!(form.banner().status(), SubmitStatus::Success);
        assert_eq!(
            form.storage.get("lastContactSubmit").unwrap().as_deref(),
            Some("1700000000000")
        );
    }

    #[tokio::test]
    async fn name_then_cooldown_scenario() {
        let store = Arc::new(FakeRecordStore::default());
        let form = form(store.clone());
        form.submit_at(&mut draft("Jane Doe", "jane@x.com", "First"), T0)
            .await
            .unwrap();

        let mut bad_name = draft("John123", "john@x.com", "Hello");
        assert_eq!(
            form.submit_at(&mut bad_name, T0 + 10_000).await,
            Err(GuardError::InvalidName)
        );
        assert_eq!(bad_name.name, "John123", "rejected drafts are kept for correction");

        let mut fixed = draft("John Doe", "john@x.com", "Hello");
        assert_eq!(
            form.submit_at(&mut fixed, T0 + 20_000).await,
            Err(GuardError::CooldownActive { remaining_secs: 40 })
        );
        assert_eq!(store.inserted().len(), 1);

        form.submit_at(&mut fixed, T0 + 60_000).await.unwrap();
        assert_eq!(store.inserted().len(), 2);
    }

    #[tokio::test]
    async fn rejected_submission_makes_no_write() {
        let store = Arc::new(FakeRecordStore::default());
        let form = form(store.clone());
        let mut d = draft("John Doe", "john@x.com", "buy now at www.spam.example");
        assert_eq!(form.submit_at(&mut d, T0).await, Err(GuardError::SpamDetected));
        assert!(store.inserted().is_empty());
        assert_eq!(form.storage.get("lastContactSubmit").unwrap(), None);
    }

    #[tokio::test]
    async fn backend_failure_is_retryable() {
        let store = Arc::new(FakeRecordStore::failing());
        let form = form(store);
        let mut d = draft("John Doe", "john@x.com", "Hello");
        assert_eq!(form.submit_at(&mut d, T0).await, Err(GuardError::SubmitFailed));
        assert_eq!(d.name, "John Doe");
        assert_eq!(form.storage.get("lastContactSubmit").unwrap(), None);
        assert_eq!(
            form.banner().status(),
            SubmitStatus::Error(GuardError::SubmitFailed)
        );
    }

    #[tokio::test]
    async fn corrupt_timestamp_does_not_block() {
        let store = Arc::new(FakeRecordStore::default());
        let form = form(store.clone());
        form.storage.set("lastContactSubmit", "yesterday").unwrap();
        form.submit_at(&mut draft("John Doe", "john@x.com", "Hello"), T0)
            .await
            .unwrap();
        assert_eq!(store.inserted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn banner_clears_after_ttl() {
        let banner = StatusBanner::new(Duration::from_secs(3));
        banner.show(SubmitStatus::Error(GuardError::InvalidName));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(banner.status(), SubmitStatus::Error(GuardError::InvalidName));

        // A newer status restarts the timer.
        banner.show(SubmitStatus::Success);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(banner.status(), SubmitStatus::Success);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(banner.status(), SubmitStatus::Idle);
    }
}
