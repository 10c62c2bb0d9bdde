//! Identity, password hashing and session tokens.

mod password;
mod service;
mod token;

pub use password::{hash_password, verify_password};
pub use service::{AuthService, Registration, Session};
pub use token::TokenSigner;

use common::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub is_admin: bool,
}

impl Identity {
    /// Fails with [`AuthError::Forbidden`] unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session token was presented.
    #[error("Authentication required")]
    Unauthenticated,

    /// The token is malformed or its signature does not match.
    #[error("Invalid session token")]
    InvalidToken,

    /// The token's expiry has passed.
    #[error("Session token expired")]
    TokenExpired,

    /// Unknown login or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The caller is authenticated but not allowed to do this.
    #[error("Admin privileges required")]
    Forbidden,

    /// The username or email is already registered.
    #[error("Account already exists: {0}")]
    AlreadyRegistered(String),

    /// Password hashing failed.
    #[error("Password hashing failed")]
    PasswordHash,
}
