//! Password hashing and signed session tokens.
//!
//! Tokens are compact JWS strings (HS256) built by hand with the same
//! hmac/sha2 primitives used elsewhere for request signing. Two kinds are
//! minted per login: a short-lived access token and a long-lived refresh
//! token. Logout revokes a token's `jti` into an in-memory blacklist, so
//! revocation does not survive a restart.
//!
//! Passwords are stored as `salt$digest` where digest is SHA-256 over the
//! salt and the password. Suitable for a demo deployment, not for
//! internet-facing credential storage.

use anyhow::{anyhow, bail, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
    /// Issued-at as a unix timestamp.
    pub iat: i64,
    /// Unique token id, the unit of revocation.
    pub jti: String,
    /// `"access"` or `"refresh"`.
    pub kind: String,
}

/// Revoked token ids. Shared across request handlers behind a mutex.
#[derive(Default)]
pub struct TokenBlacklist {
    revoked: Mutex<HashSet<String>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jti: &str) {
        if let Ok(mut set) = self.revoked.lock() {
            set.insert(jti.to_string());
        }
    }

    pub fn contains(&self, jti: &str) -> bool {
        self.revoked
            .lock()
            .map(|set| set.contains(jti))
            .unwrap_or(false)
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = hex::encode(Uuid::new_v4().as_bytes());
    format!("{}${}", salt, digest_password(&salt, password))
}

/// Check a password against a stored `salt$digest` pair.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    digest_password(salt, password) == digest
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint a signed token of the given kind for a user.
pub fn mint_token(
    secret: &str,
    user_id: &str,
    email: &str,
    kind: &str,
    ttl_secs: i64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: now + ttl_secs,
        iat: now,
        jti: Uuid::new_v4().to_string(),
        kind: kind.to_string(),
    };

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{}.{}", header, payload);
    let signature = URL_SAFE_NO_PAD.encode(sign(secret, signing_input.as_bytes())?);

    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify a token's signature, expiry, and revocation status.
pub fn verify_token(secret: &str, token: &str, blacklist: &TokenBlacklist) -> Result<Claims> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("malformed token");
    };

    let signing_input = format!("{}.{}", header, payload);
    let expected = sign(secret, signing_input.as_bytes())?;
    let given = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| anyhow!("malformed token signature"))?;
    if expected != given {
        bail!("invalid token signature");
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| anyhow!("malformed token payload"))?;
    let claims: Claims = serde_json::from_slice(&payload_bytes)?;

    if claims.exp <= Utc::now().timestamp() {
        bail!("token expired");
    }
    if blacklist.contains(&claims.jti) {
        bail!("token revoked");
    }

    Ok(claims)
}

fn sign(secret: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow!("invalid signing key"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("pw"), hash_password("pw"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("pw", "not-a-valid-record"));
    }

    #[test]
    fn token_round_trip() {
        let blacklist = TokenBlacklist::new();
        let token = mint_token("secret", "u1", "a@example.com", ACCESS_TOKEN, 900).unwrap();
        let claims = verify_token("secret", &token, &blacklist).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.kind, ACCESS_TOKEN);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let blacklist = TokenBlacklist::new();
        let token = mint_token("secret", "u1", "a@example.com", ACCESS_TOKEN, 900).unwrap();
        assert!(verify_token("other", &token, &blacklist).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let blacklist = TokenBlacklist::new();
        let token = mint_token("secret", "u1", "a@example.com", ACCESS_TOKEN, 900).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            br#"{"sub":"u2","email":"evil@example.com","exp":9999999999,"iat":0,"jti":"x","kind":"access"}"#,
        );
        parts[1] = &forged;
        assert!(verify_token("secret", &parts.join("."), &blacklist).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let blacklist = TokenBlacklist::new();
        let token = mint_token("secret", "u1", "a@example.com", ACCESS_TOKEN, 0).unwrap();
        let err = verify_token("secret", &token, &blacklist).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn revoked_token_is_rejected() {
        let blacklist = TokenBlacklist::new();
        let token = mint_token("secret", "u1", "a@example.com", REFRESH_TOKEN, 900).unwrap();
        let claims = verify_token("secret", &token, &blacklist).unwrap();
        blacklist.revoke(&claims.jti);
        let err = verify_token("secret", &token, &blacklist).unwrap_err();
        assert!(err.to_string().contains("revoked"));
    }
}
