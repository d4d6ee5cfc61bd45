//! In-memory fakes for the backend seams.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::broadcast;

use crate::clock;
use crate::guard::{AuthProvider, BoxError, RecordStore};
use crate::types::{AuthEvent, AuthUser, ContactMessage, Email, Session};

pub(crate) fn session_expiring_in(secs: i64) -> Session {
    Session::new(
        format!("token-{secs}"),
        clock::now_unix() + secs,
        AuthUser::new("admin-1").with_email("admin@example.com"),
    )
    .with_refresh_token("refresh")
}

#[derive(Debug)]
pub(crate) struct FakeProvider {
    session: Mutex<Option<Session>>,
    refreshed: Mutex<Option<Session>>,
    password: String,
    fail_get: AtomicBool,
    fail_sign_out: AtomicBool,
    events: broadcast::Sender<AuthEvent>,
    pub(crate) sign_in_calls: AtomicUsize,
    pub(crate) sign_out_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new(session: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(session),
            refreshed: Mutex::new(None),
            password: "correct-horse".into(),
            fail_get: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            events,
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Session handed out by the next successful refresh; `None` makes refresh fail.
    pub(crate) fn set_refreshed(&self, session: Option<Session>) {
        *self.refreshed.lock().unwrap() = session;
    }

    pub(crate) fn fail_get_session(&self) {
        self.fail_get.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn current(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl AuthProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, BoxError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err("network unreachable".into());
        }
        Ok(self.current())
    }

    async fn refresh_session(&self) -> Result<Session, BoxError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let refreshed = self.refreshed.lock().unwrap().clone();
        match refreshed {
            Some(session) => {
                *self.session.lock().unwrap() = Some(session.clone());
                Ok(session)
            }
            None => Err("refresh token revoked".into()),
        }
    }

    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<Session, BoxError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if email.as_str() == "admin@example.com" && password == self.password {
            let session = session_expiring_in(3_600);
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(session)
        } else {
            Err("Invalid login credentials".into())
        }
    }

    async fn sign_out(&self) -> Result<(), BoxError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = None;
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err("logout endpoint unavailable".into());
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRecordStore {
    pub(crate) inserted: Mutex<Vec<ContactMessage>>,
    fail: AtomicBool,
}

impl FakeRecordStore {
    pub(crate) fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub(crate) fn inserted(&self) -> Vec<ContactMessage> {
        self.inserted.lock().unwrap().clone()
    }
}

impl RecordStore for FakeRecordStore {
    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), BoxError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("insert rejected".into());
        }
        self.inserted.lock().unwrap().push(message.clone());
        Ok(())
    }
}
