//! Attempt-window rate limiting persisted in [`Storage`].
//!
//! The record lives under `rateLimit_<key>` as `{"count": n, "firstAttempt": epoch-millis}`.
//! The decision itself is the pure [`evaluate`]; [`check_rate_limit`] only adds
//! the storage read and write around it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::Storage;

const KEY_PREFIX: &str = "rateLimit_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u32,
    /// Epoch milliseconds of the first attempt in the current window.
    #[serde(rename = "firstAttempt")]
    pub first_attempt: i64,
}

impl RateLimitRecord {
    fn fresh(now_ms: i64) -> Self {
        Self {
            count: 1,
            first_attempt: now_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { remaining_secs: u64 },
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decide an attempt against the current record.
///
/// Returns the decision and, when the record changes, the record to persist.
#[must_use]
pub fn evaluate(
    record: Option<RateLimitRecord>,
    max_attempts: u32,
    window: Duration,
    now_ms: i64,
) -> (RateLimitDecision, Option<RateLimitRecord>) {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);

    let Some(record) = record else {
        return (RateLimitDecision::Allowed, Some(RateLimitRecord::fresh(now_ms)));
    };

    let elapsed = now_ms.saturating_sub(record.first_attempt);
    if elapsed > window_ms {
        return (RateLimitDecision::Allowed, Some(RateLimitRecord::fresh(now_ms)));
    }

    if record.count >= max_attempts {
        let remaining_ms = window_ms.saturating_sub(elapsed).max(0);
        let remaining_secs = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(0);
        return (RateLimitDecision::Limited { remaining_secs }, None);
    }

    let next = RateLimitRecord {
        count: record.count + 1,
        ..record
    };
    (RateLimitDecision::Allowed, Some(next))
}

/// Count an attempt for `key`, persisting the updated window.
///
/// A record that fails to parse is treated as absent and overwritten.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the storage backend fails.
pub fn check_rate_limit<S: Storage + ?Sized>(
    storage: &S,
    key: &str,
    max_attempts: u32,
    window: Duration,
    now_ms: i64,
) -> Result<RateLimitDecision, Error> {
    let storage_key = format!("{KEY_PREFIX}{key}");
    let record = storage
        .get(&storage_key)?
        .and_then(|raw| match serde_json::from_str::<RateLimitRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Discarding corrupt rate-limit record");
                None
            }
        });

    let (decision, update) = evaluate(record, max_attempts, window, now_ms);
    if let Some(update) = update {
        let json = serde_json::to_string(&update).map_err(|e| Error::Storage(e.to_string()))?;
        storage.set(&storage_key, &json)?;
    }
    if let RateLimitDecision::Limited { remaining_secs } = decision {
        tracing::warn!(key = %key, remaining_secs, "Rate limit exceeded");
    }
    Ok(decision)
}

/// Forget the window for `key`.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the storage backend fails.
pub fn clear_rate_limit<S: Storage + ?Sized>(storage: &S, key: &str) -> Result<(), Error> {
    storage.remove(&format!("{KEY_PREFIX}{key}"))
}
