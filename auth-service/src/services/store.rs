//! Persistence capabilities the reset flow depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use crate::{
    models::{ResetToken, TokenStatus, User, UserId},
    utils::PasswordHashString,
};

/// Result of an atomic consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed(UserId),
    NotFound,
    AlreadyUsed,
    Expired,
}

impl ConsumeOutcome {
    /// Outcome for a token that could not be consumed, judged from its stored state.
    pub fn rejected(token: Option<&ResetToken>, now: DateTime<Utc>) -> Self {
        match token.map(|t| t.status_at(now)) {
            None => ConsumeOutcome::NotFound,
            Some(TokenStatus::Consumed) => ConsumeOutcome::AlreadyUsed,
            Some(TokenStatus::Expired) => ConsumeOutcome::Expired,
            // Active rows only show up here if they appeared after the update.
            Some(TokenStatus::Active) => ConsumeOutcome::AlreadyUsed,
        }
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist `token`, deleting every other token held by the same user.
    async fn insert_superseding(&self, token: &ResetToken) -> Result<(), StoreError>;

    async fn find_token(&self, token_digest: &str) -> Result<Option<ResetToken>, StoreError>;

    /// Flip `consumed` if and only if the token exists, is unconsumed and
    /// unexpired at `now`. Exactly one concurrent caller can observe `Consumed`.
    async fn consume_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Delete tokens whose expiry is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError>;

    async fn update_credential_hash(
        &self,
        user_id: UserId,
        password_hash: &PasswordHashString,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ResetStore: TokenStore + CredentialStore {
    /// Consume the token and write the bound user's new credential hash as one
    /// unit. On any error or non-`Consumed` outcome neither change is kept.
    async fn consume_and_set_credential(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
        password_hash: &PasswordHashString,
    ) -> Result<ConsumeOutcome, StoreError>;
}
