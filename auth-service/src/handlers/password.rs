use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{PasswordResetConfirm, PasswordResetRequest},
        MessageResponse,
    },
    utils::{Password, ValidatedJson},
    AppState,
};

/// Body returned for every well-formed reset request, registered email or not.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If your email is registered, you will receive a password reset link shortly.";

pub const RESET_COMPLETED_MESSAGE: &str =
    "Password reset successful. You can now login with your new password.";

/// Request a password reset link
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .reset_service
        .request_reset(&req.email)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to process password reset request");
            AppError::from(e)
        })?;

    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_REQUESTED_MESSAGE))))
}

/// Confirm password reset with token
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .reset_service
        .redeem(&req.token, Password::new(req.new_password))
        .await
        .map_err(|e| {
            if e.is_token_error() {
                tracing::info!(error = %e, "Rejected password reset confirmation");
            } else {
                tracing::error!(error = %e, "Failed to confirm password reset");
            }
            AppError::from(e)
        })?;

    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_COMPLETED_MESSAGE))))
}
