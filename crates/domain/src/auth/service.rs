//! Registration, login and token authentication.

use chrono::{DateTime, Utc};
use store::{NewUser, Store, StoreError, StoreTx, User};

use super::{AuthError, Identity, MIN_PASSWORD_LEN, TokenSigner, hash_password, verify_password};
use crate::error::DomainError;

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Service for accounts and sessions.
pub struct AuthService<S: Store> {
    store: S,
    signer: TokenSigner,
}

impl<S: Store> AuthService<S> {
    pub fn new(store: S, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Creates a customer account and signs it in.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Session, DomainError> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_lowercase();

        if !(3..=32).contains(&username.chars().count()) {
            return Err(DomainError::invalid(
                "username must be between 3 and 32 characters",
            ));
        }
        if !is_plausible_email(&email) {
            return Err(DomainError::invalid("email address is not valid"));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = hash_password(&registration.password)?;

        let mut tx = self.store.begin().await?;
        let user = tx
            .insert_user(NewUser {
                username,
                email,
                password_hash,
                is_admin: false,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(constraint) => {
                    DomainError::Auth(AuthError::AlreadyRegistered(
                        taken_field(&constraint).to_string(),
                    ))
                }
                other => DomainError::from(other),
            })?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User registered");
        metrics::counter!("users_registered_total").increment(1);

        self.issue_session(&user)
    }

    /// Checks a username-or-email and password and issues a session.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<Session, DomainError> {
        let login = normalize_login(login);
        let mut tx = self.store.begin().await?;
        let user = tx.find_user_by_login(&login).await?;
        tx.commit().await?;

        let Some(user) = user else {
            tracing::debug!("Login for unknown account");
            return Err(AuthError::InvalidCredentials.into());
        };
        verify_password(password, &user.password_hash)?;

        self.issue_session(&user)
    }

    /// Resolves a presented token into the caller's identity.
    pub fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.signer.verify(token)
    }

    /// Issues a session for an existing user.
    pub fn issue_session(&self, user: &User) -> Result<Session, DomainError> {
        let identity = Identity {
            user_id: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin,
        };
        let token = self.signer.issue(&identity)?;

        Ok(Session {
            token,
            identity,
            expires_at: Utc::now() + self.signer.ttl(),
        })
    }
}

/// Emails are stored lowercased, so an email-shaped login is matched the same way.
fn normalize_login(login: &str) -> String {
    let login = login.trim();
    if login.contains('@') {
        login.to_lowercase()
    } else {
        login.to_string()
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

fn taken_field(constraint: &str) -> &'static str {
    if constraint.contains("email") {
        "email"
    } else {
        "username"
    }
}
