//! In-process store used by tests and local runs.
//!
//! Users and tokens live behind one mutex, so every trait method is a single
//! critical section and `consume_and_set_credential` is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    error::StoreError,
    store::{ConsumeOutcome, CredentialStore, ResetStore, TokenStore},
};
use crate::{
    models::{ResetToken, TokenStatus, User, UserId},
    utils::PasswordHashString,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    tokens: HashMap<String, ResetToken>,
}

impl MemoryState {
    fn write_credential(
        &mut self,
        user_id: UserId,
        password_hash: &PasswordHashString,
        fail: bool,
    ) -> Result<(), StoreError> {
        if fail {
            return Err(StoreError::Unavailable(
                "injected credential write failure".to_string(),
            ));
        }
        let user = self.users.get_mut(&user_id).ok_or(StoreError::UserNotFound)?;
        user.password_hash = password_hash.as_str().to_string();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_credential_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap_or_else(|e| e.into_inner());
            for user in users {
                state.users.insert(user.user_id, user);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Memory store mutex poisoned: {}", e)))
    }

    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.lock()?.users.insert(user.user_id, user);
        Ok(())
    }

    /// Make every subsequent credential write fail, for atomicity tests.
    pub fn fail_credential_writes(&self, fail: bool) {
        self.fail_credential_writes.store(fail, Ordering::SeqCst);
    }

    /// All stored tokens belonging to `user_id`.
    pub fn tokens_for(&self, user_id: UserId) -> Result<Vec<ResetToken>, StoreError> {
        Ok(self
            .lock()?
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn token_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.tokens.len())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_superseding(&self, token: &ResetToken) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.tokens.retain(|_, t| t.user_id != token.user_id);
        state
            .tokens
            .insert(token.token_digest.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token_digest: &str) -> Result<Option<ResetToken>, StoreError> {
        Ok(self.lock()?.tokens.get(token_digest).cloned())
    }

    async fn consume_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut state = self.lock()?;
        match state.tokens.get_mut(token_digest) {
            Some(token) if token.status_at(now) == TokenStatus::Active => {
                token.consumed = true;
                Ok(ConsumeOutcome::Consumed(token.user_id))
            }
            other => Ok(ConsumeOutcome::rejected(other.as_deref(), now)),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        // Full Unicode folding, matching LOWER() on the Postgres side.
        let wanted = email.to_lowercase();
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn update_credential_hash(
        &self,
        user_id: UserId,
        password_hash: &PasswordHashString,
    ) -> Result<(), StoreError> {
        let fail = self.fail_credential_writes.load(Ordering::SeqCst);
        self.lock()?.write_credential(user_id, password_hash, fail)
    }
}

#[async_trait]
impl ResetStore for MemoryStore {
    async fn consume_and_set_credential(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
        password_hash: &PasswordHashString,
    ) -> Result<ConsumeOutcome, StoreError> {
        let fail = self.fail_credential_writes.load(Ordering::SeqCst);
        let mut state = self.lock()?;

        let user_id = match state.tokens.get_mut(token_digest) {
            Some(token) if token.status_at(now) == TokenStatus::Active => {
                token.consumed = true;
                token.user_id
            }
            other => return Ok(ConsumeOutcome::rejected(other.as_deref(), now)),
        };

        if let Err(e) = state.write_credential(user_id, password_hash, fail) {
            // Roll the consume back before anyone else can take the lock.
            if let Some(token) = state.tokens.get_mut(token_digest) {
                token.consumed = false;
            }
            return Err(e);
        }

        Ok(ConsumeOutcome::Consumed(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;

    fn seeded() -> (MemoryStore, User) {
        let user = User::new("owner@clinic.example", Role::HealthStructure, "old-hash");
        (MemoryStore::with_users([user.clone()]), user)
    }

    fn token_for(user: &User, digest: &str, issued_at: DateTime<Utc>) -> ResetToken {
        ResetToken::new(digest.to_string(), user.user_id, issued_at, Duration::minutes(60))
    }

    #[tokio::test]
    async fn test_insert_supersedes_previous_tokens() {
        let (store, user) = seeded();
        let now = Utc::now();
        store.insert_superseding(&token_for(&user, "first", now)).await.unwrap();
        store.insert_superseding(&token_for(&user, "second", now)).await.unwrap();

        assert!(store.find_token("first").await.unwrap().is_none());
        assert!(store.find_token("second").await.unwrap().is_some());
        assert_eq!(store.tokens_for(user.user_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consume_token_once() {
        let (store, user) = seeded();
        let now = Utc::now();
        store.insert_superseding(&token_for(&user, "t", now)).await.unwrap();

        assert_eq!(
            store.consume_token("t", now).await.unwrap(),
            ConsumeOutcome::Consumed(user.user_id)
        );
        assert_eq!(store.consume_token("t", now).await.unwrap(), ConsumeOutcome::AlreadyUsed);
        assert_eq!(store.consume_token("missing", now).await.unwrap(), ConsumeOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_consume_expired_token() {
        let (store, user) = seeded();
        let now = Utc::now();
        store.insert_superseding(&token_for(&user, "t", now)).await.unwrap();

        let outcome = store.consume_token("t", now + Duration::minutes(61)).await.unwrap();
        assert_eq!(outcome, ConsumeOutcome::Expired);
        assert!(!store.find_token("t").await.unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn test_injected_credential_failure_keeps_both_unchanged() {
        let (store, user) = seeded();
        let now = Utc::now();
        store.insert_superseding(&token_for(&user, "t", now)).await.unwrap();
        store.fail_credential_writes(true);

        let hash = PasswordHashString::new("new-hash".to_string());
        let result = store.consume_and_set_credential("t", now, &hash).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        assert!(!store.find_token("t").await.unwrap().unwrap().consumed);
        let stored = store.find_user_by_id(user.user_id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "old-hash");
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, user) = seeded();
        let other = User::new("other@example.com", Role::Standard, "hash");
        store.insert_user(other.clone()).unwrap();
        let now = Utc::now();
        store.insert_superseding(&token_for(&user, "old", now - Duration::hours(2))).await.unwrap();
        store.insert_superseding(&token_for(&other, "fresh", now)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert_eq!(store.token_count().unwrap(), 1);
        assert!(store.find_token("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let (store, user) = seeded();
        let found = store.find_user_by_email("OWNER@Clinic.Example").await.unwrap();
        assert_eq!(found.map(|u| u.user_id), Some(user.user_id));
    }

    #[tokio::test]
    async fn test_email_lookup_folds_non_ascii_letters() {
        let user = User::new("élodie@clinique.example", Role::HealthStructure, "hash");
        let store = MemoryStore::with_users([user.clone()]);

        let found = store.find_user_by_email("ÉLODIE@Clinique.Example").await.unwrap();
        assert_eq!(found.map(|u| u.user_id), Some(user.user_id));
    }
}
