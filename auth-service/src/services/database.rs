//! PostgreSQL-backed token and credential stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{
    error::StoreError,
    store::{ConsumeOutcome, CredentialStore, ResetStore, TokenStore},
};
use crate::{
    models::{ResetToken, User, UserId},
    utils::PasswordHashString,
};

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: UserId,
    email: String,
    role_code: String,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role_code.parse().map_err(StoreError::InvalidRecord)?;
        Ok(User {
            user_id: row.user_id,
            email: row.email,
            role,
            password_hash: row.password_hash,
        })
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Row-lock the user. Every transaction that touches both tables takes
    /// this lock before any token row, so they cannot deadlock each other.
    async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let locked = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(locked.is_some())
    }

    /// Conditional update that only succeeds for an active token.
    async fn consume_in(
        tx: &mut Transaction<'_, Postgres>,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        // Plain read, no row lock: find whose user row to lock first.
        let owner = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM password_reset_tokens WHERE token_digest = $1",
        )
        .bind(token_digest)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(owner) = owner else {
            return Ok(ConsumeOutcome::NotFound);
        };
        Self::lock_user(tx, owner).await?;

        // A supersede that committed while we waited has deleted the row,
        // which the fallback lookup below reports as not found.
        let consumed = sqlx::query_scalar::<_, UserId>(
            r#"
            UPDATE password_reset_tokens
            SET consumed = TRUE, consumed_utc = $2
            WHERE token_digest = $1 AND consumed = FALSE AND expires_utc > $2
            RETURNING user_id
            "#,
        )
        .bind(token_digest)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(user_id) = consumed {
            return Ok(ConsumeOutcome::Consumed(user_id));
        }

        let existing = sqlx::query_as::<_, ResetToken>(
            r#"
            SELECT token_digest, user_id, issued_utc AS issued_at, expires_utc AS expires_at, consumed
            FROM password_reset_tokens
            WHERE token_digest = $1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(ConsumeOutcome::rejected(existing.as_ref(), now))
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_superseding(&self, token: &ResetToken) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes issuance and redemption for the same account.
        if !Self::lock_user(&mut tx, token.user_id).await? {
            tx.rollback().await.ok();
            return Err(StoreError::UserNotFound);
        }

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token_digest, user_id, issued_utc, expires_utc, consumed)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.token_digest)
        .bind(token.user_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.consumed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_token(&self, token_digest: &str) -> Result<Option<ResetToken>, StoreError> {
        let token = sqlx::query_as::<_, ResetToken>(
            r#"
            SELECT token_digest, user_id, issued_utc AS issued_at, expires_utc AS expires_at, consumed
            FROM password_reset_tokens
            WHERE token_digest = $1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn consume_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let outcome = Self::consume_in(&mut tx, token_digest, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_utc <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, email, role_code, password_hash FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, email, role_code, password_hash FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn update_credential_hash(
        &self,
        user_id: UserId,
        password_hash: &PasswordHashString,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_utc = NOW() WHERE user_id = $2",
        )
        .bind(password_hash.as_str())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ResetStore for PgStore {
    async fn consume_and_set_credential(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
        password_hash: &PasswordHashString,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let user_id = match Self::consume_in(&mut tx, token_digest, now).await? {
            ConsumeOutcome::Consumed(user_id) => user_id,
            rejected => {
                tx.rollback().await?;
                return Ok(rejected);
            }
        };

        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_utc = NOW() WHERE user_id = $2",
        )
        .bind(password_hash.as_str())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::UserNotFound);
        }

        tx.commit().await?;
        Ok(ConsumeOutcome::Consumed(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_user_row_conversion() {
        let row = UserRow {
            user_id: UserId::new(),
            email: "admin@example.com".to_string(),
            role_code: "admin".to_string(),
            password_hash: "hash".to_string(),
        };
        let user = User::try_from(row).unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_user_row_with_unknown_role_is_rejected() {
        let row = UserRow {
            user_id: UserId::new(),
            email: "x@example.com".to_string(),
            role_code: "moderator".to_string(),
            password_hash: "hash".to_string(),
        };
        assert!(matches!(User::try_from(row), Err(StoreError::InvalidRecord(_))));
    }
}
