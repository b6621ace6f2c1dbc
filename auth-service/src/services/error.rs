use service_core::error::AppError;
use thiserror::Error;

use super::policy::PolicyError;

/// Wording shared by every token failure so callers cannot tell which one occurred.
pub const INVALID_RESET_LINK_MESSAGE: &str = "This password reset link is invalid or has expired.";

/// Failures of the token and credential stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Failures of the reset-link delivery channel.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ResetError {
    #[error("Secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    #[error("Reset token not found")]
    TokenNotFound,

    #[error("Reset token expired")]
    TokenExpired,

    #[error("Reset token already used")]
    TokenAlreadyUsed,

    #[error("Password does not meet policy: {}", join_violations(.0))]
    WeakPassword(Vec<PolicyError>),

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_violations(violations: &[PolicyError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResetError {
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            ResetError::TokenNotFound | ResetError::TokenExpired | ResetError::TokenAlreadyUsed
        )
    }

    /// Message safe to show to the person following the link.
    pub fn public_message(&self) -> String {
        match self {
            ResetError::TokenNotFound | ResetError::TokenExpired | ResetError::TokenAlreadyUsed => {
                INVALID_RESET_LINK_MESSAGE.to_string()
            }
            ResetError::WeakPassword(_) => self.to_string(),
            ResetError::RandomnessUnavailable(_)
            | ResetError::Hashing(_)
            | ResetError::Store(_) => "Internal server error".to_string(),
        }
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::TokenNotFound
            | ResetError::TokenExpired
            | ResetError::TokenAlreadyUsed
            | ResetError::WeakPassword(_) => AppError::BadRequest(anyhow::anyhow!(err.public_message())),
            ResetError::RandomnessUnavailable(e) => {
                AppError::InternalError(anyhow::anyhow!("Secure randomness unavailable: {}", e))
            }
            ResetError::Hashing(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ResetError::Store(StoreError::Database(e)) => AppError::DatabaseError(anyhow::Error::new(e)),
            ResetError::Store(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}
