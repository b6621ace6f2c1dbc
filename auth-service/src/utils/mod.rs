pub mod password;
pub mod validation;

pub use password::{hash_password, verify_password, Argon2Settings, Password, PasswordHashString};
pub use validation::ValidatedJson;
