//! Password policy validation.
//!
//! Checks a candidate password against the configured [`PasswordPolicy`].

use crate::models::PasswordPolicy;

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Password is too short.
    PasswordTooShort {
        min_length: usize,
        actual_length: usize,
    },
    /// Password missing uppercase letter.
    PasswordMissingUppercase,
    /// Password missing number.
    PasswordMissingNumber,
    /// Password missing special character.
    PasswordMissingSpecial,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::PasswordTooShort {
                min_length,
                actual_length,
            } => {
                write!(
                    f,
                    "Password must be at least {} characters (got {})",
                    min_length, actual_length
                )
            }
            PolicyError::PasswordMissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            PolicyError::PasswordMissingNumber => {
                write!(f, "Password must contain at least one number")
            }
            PolicyError::PasswordMissingSpecial => {
                write!(f, "Password must contain at least one special character")
            }
        }
    }
}

impl std::error::Error for PolicyError {}

#[derive(Debug, Clone)]
pub struct PolicyService;

impl PolicyService {
    /// Every violation of `policy`, in a fixed order. Empty means acceptable.
    pub fn validate_password(password: &str, policy: &PasswordPolicy) -> Vec<PolicyError> {
        let mut errors = Vec::new();

        let length = password.chars().count();
        if length < policy.min_length {
            errors.push(PolicyError::PasswordTooShort {
                min_length: policy.min_length,
                actual_length: length,
            });
        }

        if policy.require_uppercase && !password.chars().any(char::is_uppercase) {
            errors.push(PolicyError::PasswordMissingUppercase);
        }

        if policy.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(PolicyError::PasswordMissingNumber);
        }

        if policy.require_special && !password.chars().any(|c| c.is_ascii_punctuation()) {
            errors.push(PolicyError::PasswordMissingSpecial);
        }

        errors
    }
}
