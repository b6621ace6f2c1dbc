use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// The new password is checked against the configured policy by the reset
/// flow, not here.
#[derive(Deserialize, Validate)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub new_password: String,
}
