use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::security;

/// User identifier assigned by the hosted auth provider (opaque string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Bearer token issued by the auth provider.
///
/// `Debug` is redacted so sessions can be logged without leaking credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Validated, lowercased email address.
///
/// Holding an `Email` proves it has the `local@domain.tld` shape.
/// Use `" Admin@Example.com ".parse::<Email>()` or `Email::try_from(string)` to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for Email {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let normalized = s.trim().to_lowercase();
        if security::is_valid_email(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(Error::InvalidEmail(s))
        }
    }
}

impl From<Email> for String {
    fn from(e: Email) -> Self {
        e.0
    }
}

/// The authenticated principal behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// An active login held by the auth provider.
///
/// The application only observes it; creation, refresh and destruction
/// are delegated to the [`AuthProvider`](crate::guard::AuthProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Session {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<AccessToken>,
    /// Expiry as epoch seconds.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: i64, user: AuthUser) -> Self {
        Self {
            access_token: AccessToken(access_token.into()),
            refresh_token: None,
            expires_at,
            user,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(AccessToken(token.into()));
        self
    }

    /// A session whose expiry is at or before `now` is no longer usable.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Seconds left until expiry; negative once expired.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        self.expires_at - now
    }
}

/// Auth-state-change notification, delivered in provider order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthEvent {
    SignedIn(Option<Session>),
    SignedOut,
    TokenRefreshed(Option<Session>),
    PasswordRecovery,
}

/// Read state of a stored contact message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[non_exhaustive]
pub enum MessageStatus {
    #[default]
    Unread,
    Read,
    Replied,
    Archived,
}

/// A validated contact-form message ready for the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthUser {
        AuthUser::new("user-1").with_email("admin@example.com")
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email: Email = "  Admin@Example.COM ".parse().unwrap();
        assert_eq!(email.as_str(), "admin@example.com");
    }

    #[test]
    fn invalid_email_rejected() {
        assert!("no-at-sign".parse::<Email>().is_err());
        assert!("a@b".parse::<Email>().is_err());
        assert!("a b@c.d".parse::<Email>().is_err());
        assert!("".parse::<Email>().is_err());
    }

    #[test]
    fn email_serde_roundtrip() {
        let email: Email = "x@y.io".parse().unwrap();
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"x@y.io\"");
        assert!(serde_json::from_str::<Email>("\"broken\"").is_err());
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let session = Session::new("tok", 1_000, admin());
        assert!(!session.is_expired_at(999));
        assert!(session.is_expired_at(1_000));
        assert!(session.is_expired_at(1_001));
        assert_eq!(session.seconds_until_expiry(990), 10);
        assert_eq!(session.seconds_until_expiry(1_010), -10);
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let session = Session::new("super-secret", 1, admin()).with_refresh_token("also-secret");
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("also-secret"));
    }

    #[test]
    fn message_status_serializes_by_variant_name() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Unread).unwrap(),
            "\"Unread\""
        );
        assert_eq!(
            serde_json::from_str::<MessageStatus>("\"Archived\"").unwrap(),
            MessageStatus::Archived
        );
        assert!(serde_json::from_str::<MessageStatus>("\"unread\"").is_err());
        assert_eq!(MessageStatus::default(), MessageStatus::Unread);
    }

    #[test]
    fn contact_message_insert_body() {
        let message = ContactMessage {
            name: "Jane Doe".into(),
            email: "jane@example.com".parse().unwrap(),
            subject: "Hello".into(),
            message: "Let's talk.".into(),
            status: MessageStatus::default(),
        };
        let body = serde_json::to_value(&message).unwrap();
        assert_eq!(body["status"], "Unread");
        assert_eq!(body["email"], "jane@example.com");
        assert_eq!(body["name"], "Jane Doe");
    }
}
