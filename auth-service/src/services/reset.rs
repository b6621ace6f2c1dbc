//! Password reset flow: request → issue → deliver, then validate → redeem.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{
    clock::Clock,
    email::ResetLinkSender,
    error::{DeliveryError, ResetError},
    link::ResetLink,
    policy::PolicyService,
    store::ResetStore,
    token::{digest, outcome_to_result, TokenCodec},
};
use crate::{
    config::ResetConfig,
    models::{User, UserId},
    utils::{hash_password, Password},
};

/// What happened to a reset request. Never shown to the requester, who gets
/// the same answer whether or not the email is registered.
#[derive(Debug)]
pub enum ResetRequestOutcome {
    /// No account matches; nothing was issued.
    UnknownEmail,
    /// Issuance and delivery continue in the background.
    Accepted {
        user_id: UserId,
        delivery: PendingDelivery,
    },
}

impl ResetRequestOutcome {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            ResetRequestOutcome::UnknownEmail => None,
            ResetRequestOutcome::Accepted { user_id, .. } => Some(*user_id),
        }
    }
}

/// How the background half of an accepted request ended.
#[derive(Debug)]
pub enum DeliveryReport {
    Delivered,
    /// The token was issued and stays redeemable, but the link did not go out.
    DeliveryFailed(DeliveryError),
    /// No token was issued.
    IssuanceFailed(ResetError),
    /// The background task panicked or was cancelled.
    Aborted(String),
}

/// Handle on the background issuance and delivery of one request.
/// Dropping it detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct PendingDelivery(JoinHandle<DeliveryReport>);

impl PendingDelivery {
    pub async fn wait(self) -> DeliveryReport {
        self.0
            .await
            .unwrap_or_else(|e| DeliveryReport::Aborted(e.to_string()))
    }
}

#[derive(Clone)]
pub struct ResetService {
    store: Arc<dyn ResetStore>,
    codec: TokenCodec<dyn ResetStore>,
    sender: Arc<dyn ResetLinkSender>,
    clock: Arc<dyn Clock>,
    config: ResetConfig,
}

impl ResetService {
    pub fn new(
        store: Arc<dyn ResetStore>,
        sender: Arc<dyn ResetLinkSender>,
        clock: Arc<dyn Clock>,
        config: ResetConfig,
    ) -> Self {
        let codec = TokenCodec::new(store.clone(), clock.clone(), config.token_ttl());
        Self {
            store,
            codec,
            sender,
            clock,
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec<dyn ResetStore> {
        &self.codec
    }

    pub fn config(&self) -> &ResetConfig {
        &self.config
    }

    /// Look the email up and return. For a registered email the token is
    /// issued and the link sent on a spawned task, so both answers take the
    /// same time and fail the same way.
    pub async fn request_reset(&self, email: &str) -> Result<ResetRequestOutcome, ResetError> {
        let user = match self.store.find_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => {
                tracing::info!("Password reset requested for an unregistered email");
                return Ok(ResetRequestOutcome::UnknownEmail);
            }
        };

        let user_id = user.user_id;
        let service = self.clone();
        let handle = tokio::spawn(async move { service.issue_and_deliver(user).await });

        Ok(ResetRequestOutcome::Accepted {
            user_id,
            delivery: PendingDelivery(handle),
        })
    }

    async fn issue_and_deliver(&self, user: User) -> DeliveryReport {
        let issued = match self.codec.issue(user.user_id).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(
                    user_id = %user.user_id,
                    error = %e,
                    "Failed to issue password reset token"
                );
                return DeliveryReport::IssuanceFailed(e);
            }
        };

        let link = ResetLink::build(
            &self.config.link_base_url,
            &self.config.link_path,
            &issued.value,
            &user.email,
        );

        match self.sender.send_reset_link(&user.email, &link).await {
            Ok(()) => {
                tracing::info!(user_id = %user.user_id, "Password reset link delivered");
                DeliveryReport::Delivered
            }
            Err(e) => {
                // Token stays valid; a new request supersedes it.
                tracing::warn!(
                    user_id = %user.user_id,
                    error = %e,
                    "Password reset link delivery failed"
                );
                DeliveryReport::DeliveryFailed(e)
            }
        }
    }

    /// Redeem `token_value` and set `new_password`. The token is consumed and
    /// the credential replaced together, or not at all.
    pub async fn redeem(&self, token_value: &str, new_password: Password) -> Result<UserId, ResetError> {
        self.codec.validate(token_value).await?;

        let violations =
            PolicyService::validate_password(new_password.as_str(), &self.config.password_policy);
        if !violations.is_empty() {
            return Err(ResetError::WeakPassword(violations));
        }

        let settings = self.config.argon2;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&new_password, &settings))
            .await
            .map_err(|e| ResetError::Hashing(e.to_string()))?
            .map_err(|e| ResetError::Hashing(e.to_string()))?;

        let outcome = self
            .store
            .consume_and_set_credential(&digest(token_value), self.clock.now(), &password_hash)
            .await?;
        let user_id = outcome_to_result(outcome)?;

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(user_id)
    }

    pub async fn purge_expired(&self) -> Result<u64, ResetError> {
        self.codec.purge_expired().await
    }
}
