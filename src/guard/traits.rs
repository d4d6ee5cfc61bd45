use std::future::Future;

use tokio::sync::broadcast;

use crate::types::{AuthEvent, ContactMessage, Email, Session};

/// Error type returned by consumer-provided backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The hosted auth provider the guards observe.
///
/// The crate never creates or validates credentials itself; it only reads the
/// session, asks for refresh/sign-out, and listens to state changes.
///
/// # Example
///
/// ```rust,ignore
/// impl AuthProvider for MyBackend {
///     async fn get_session(&self) -> Result<Option<Session>, BoxError> {
///         Ok(self.sdk.auth().session().await?)
///     }
///     // ...
///     fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
///         self.events.subscribe()
///     }
/// }
/// ```
pub trait AuthProvider: Send + Sync + 'static {
    /// Current session, if any. Expired sessions may still be returned.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, BoxError>> + Send;

    /// Extend the current session.
    fn refresh_session(&self) -> impl Future<Output = Result<Session, BoxError>> + Send;

    /// Sign in with email and password. Failure is opaque by contract.
    fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<Session, BoxError>> + Send;

    /// Invalidate the local session.
    fn sign_out(&self) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Auth-state-change notifications, in emission order.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// The hosted record store that persists contact messages.
pub trait RecordStore: Send + Sync + 'static {
    fn insert_contact_message(
        &self,
        message: &ContactMessage,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}
