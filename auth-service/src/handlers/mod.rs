//! HTTP handlers for the reset flow.

pub mod password;

pub use password::*;
