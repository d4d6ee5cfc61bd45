#![doc = include_str!("../README.md")]

pub mod clock;
pub mod countdown;
pub mod error;
pub mod guard;
#[cfg(feature = "hosted")]
pub mod hosted;
#[cfg(feature = "axum")]
pub mod http;
pub mod rate_limit;
pub mod security;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use error::Error;
pub use guard::{
    Access, AuthProvider, ContactForm, ExpiryWarner, GuardConfig, GuardError, LoginFlow,
    RecordStore, SessionGuard,
};
#[cfg(feature = "hosted")]
pub use hosted::{HostedBackend, HostedConfig};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use types::{AuthEvent, AuthUser, ContactMessage, Email, MessageStatus, Session};
