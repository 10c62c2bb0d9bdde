//! Stateless session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256(payload))`,
//! where the MAC covers the encoded payload exactly as sent.

use std::fmt;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use common::UserId;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{AuthError, Identity};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: UserId,
    email: String,
    admin: bool,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HMAC-signed session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `identity` valid for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, Utc::now())
    }

    /// Verifies a token's signature and expiry and returns its identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, Utc::now())
    }

    fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            admin: identity.is_admin,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let json = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::InvalidToken)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            is_admin: claims.admin,
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)
    }
}
