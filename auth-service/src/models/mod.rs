pub mod password_policy;
pub mod reset_token;
pub mod structure;
pub mod user;

pub use password_policy::PasswordPolicy;
pub use reset_token::{ResetToken, TokenStatus};
pub use structure::Structure;
pub use user::{Actor, Role, User, UserId};
