use serde::{Deserialize, Serialize};

/// Password rules applied when a new credential is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum password length in characters (default: 8)
    pub min_length: usize,

    /// Require at least one uppercase letter
    pub require_uppercase: bool,

    /// Require at least one numeric digit
    pub require_number: bool,

    /// Require at least one special character
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_number: true,
            require_special: false,
        }
    }
}
