//! User model - directory accounts and their roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Account roles. Persisted as their snake_case code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    HealthStructure,
    Standard,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::HealthStructure => "health_structure",
            Role::Standard => "standard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "health_structure" => Ok(Role::HealthStructure),
            "standard" => Ok(Role::Standard),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// User entity as the reset flow sees it.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

impl User {
    /// Create a new user with an already-hashed credential.
    pub fn new(email: impl Into<String>, role: Role, password_hash: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(),
            email: email.into(),
            role,
            password_hash: password_hash.into(),
        }
    }

    /// Identity used when evaluating gates for this user.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            role: self.role,
        }
    }
}

/// The requester a gate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in [Role::Admin, Role::HealthStructure, Role::Standard] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_code_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_actor_carries_id_and_role() {
        let user = User::new("clinic@example.com", Role::HealthStructure, "hash");
        let actor = user.actor();
        assert_eq!(actor.id, user.user_id);
        assert_eq!(actor.role, Role::HealthStructure);
    }
}
