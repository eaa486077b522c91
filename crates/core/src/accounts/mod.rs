//! User accounts: registration, email verification, login and profiles.

mod controller;
mod types;

pub use controller::AuthController;
pub use types::*;

use thiserror::Error;

use crate::db::DbError;

/// Errors from account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("The email {0} is already registered")]
    DuplicateEmail(String),

    #[error("Email not registered")]
    UnknownEmail,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Database(#[from] DbError),
}
