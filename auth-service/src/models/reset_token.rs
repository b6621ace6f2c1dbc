use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

/// Where a stored token stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    Consumed,
    Expired,
}

/// A persisted password-reset grant. Only the SHA-256 digest of the
/// opaque token value is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResetToken {
    pub token_digest: String,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ResetToken {
    pub fn new(token_digest: String, user_id: UserId, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_digest,
            user_id,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
        }
    }

    /// A token stops being valid at the exact instant `expires_at` is reached.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Consumption is reported ahead of expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.consumed {
            TokenStatus::Consumed
        } else if self.is_expired_at(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }
}
