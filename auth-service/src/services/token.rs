//! Reset token codec: minting, validation and single-use consumption.

use chrono::Duration;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{
    clock::Clock,
    error::ResetError,
    store::{ConsumeOutcome, TokenStore},
};
use crate::models::{ResetToken, TokenStatus, UserId};

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// The opaque value handed to the user. Never persisted and never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ResetTokenValue(String);

impl ResetTokenValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Lookup key under which the token is stored.
    pub fn digest(&self) -> String {
        digest(&self.0)
    }
}

impl std::fmt::Debug for ResetTokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResetTokenValue(***)")
    }
}

/// A freshly issued token: the raw value for delivery plus the stored record.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: ResetTokenValue,
    pub record: ResetToken,
}

/// SHA-256 hex digest of a raw token value.
pub fn digest(token_value: &str) -> String {
    hex::encode(Sha256::digest(token_value.as_bytes()))
}

/// Draw a token value from `rng`. Any RNG failure is fatal for issuance.
pub fn random_token_value<R: RngCore + ?Sized>(rng: &mut R) -> Result<ResetTokenValue, ResetError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| ResetError::RandomnessUnavailable(e.to_string()))?;
    Ok(ResetTokenValue(hex::encode(bytes)))
}

/// Map a store consume outcome onto the token error taxonomy.
pub(crate) fn outcome_to_result(outcome: ConsumeOutcome) -> Result<UserId, ResetError> {
    match outcome {
        ConsumeOutcome::Consumed(user_id) => Ok(user_id),
        ConsumeOutcome::NotFound => Err(ResetError::TokenNotFound),
        ConsumeOutcome::AlreadyUsed => Err(ResetError::TokenAlreadyUsed),
        ConsumeOutcome::Expired => Err(ResetError::TokenExpired),
    }
}

pub struct TokenCodec<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<S: ?Sized> Clone for TokenCodec<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S: TokenStore + ?Sized> TokenCodec<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint and persist a token for `user_id`, superseding any older one.
    pub async fn issue(&self, user_id: UserId) -> Result<IssuedToken, ResetError> {
        let value = random_token_value(&mut OsRng)?;
        let record = ResetToken::new(value.digest(), user_id, self.clock.now(), self.ttl);

        self.store.insert_superseding(&record).await?;

        tracing::info!(
            user_id = %user_id,
            expires_at = %record.expires_at,
            "Password reset token issued"
        );

        Ok(IssuedToken { value, record })
    }

    /// Resolve the user a token is bound to, without changing it.
    pub async fn validate(&self, token_value: &str) -> Result<UserId, ResetError> {
        let token = self
            .store
            .find_token(&digest(token_value))
            .await?
            .ok_or(ResetError::TokenNotFound)?;

        match token.status_at(self.clock.now()) {
            TokenStatus::Active => Ok(token.user_id),
            TokenStatus::Consumed => Err(ResetError::TokenAlreadyUsed),
            TokenStatus::Expired => Err(ResetError::TokenExpired),
        }
    }

    /// Mark a token used. Re-checks validity inside the store's atomic update,
    /// so concurrent callers race safely: one wins, the rest see `TokenAlreadyUsed`.
    pub async fn consume(&self, token_value: &str) -> Result<(), ResetError> {
        let outcome = self
            .store
            .consume_token(&digest(token_value), self.clock.now())
            .await?;
        let user_id = outcome_to_result(outcome)?;
        tracing::info!(user_id = %user_id, "Password reset token consumed");
        Ok(())
    }

    /// Garbage-collect expired tokens.
    pub async fn purge_expired(&self) -> Result<u64, ResetError> {
        let removed = self.store.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired password reset tokens");
        }
        Ok(removed)
    }
}
