//! HS256 session tokens.
//!
//! Tokens are compact JWS strings: `base64url(header).base64url(payload).base64url(mac)`
//! where `mac` is HMAC-SHA256 over the first two segments, keyed with the UTF-8 bytes
//! of the configured session secret. Only `alg = "HS256"` is accepted.

use std::fmt;

use anyhow::{anyhow, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::principal::{Identity, DEFAULT_ROLE};

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "session";

const ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

/// The single caller-visible authentication failure.
///
/// Missing cookie, malformed token, bad signature and expiry all collapse into
/// this variant; the concrete reason only shows up in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Claims carried in the token payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl SessionClaims {
    pub fn new<S: Into<String>>(username: S) -> Self {
        Self { username: username.into(), ..Default::default() }
    }

    pub fn with_role<S: Into<String>>(mut self, role: S) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Stamp `iat = now` and `exp = now + ttl_secs`.
    pub fn valid_for(mut self, now: i64, ttl_secs: i64) -> Self {
        self.iat = Some(now);
        self.exp = Some(now.saturating_add(ttl_secs));
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Why a token was turned away. Logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    UnsupportedAlgorithm,
    BadSignature,
    Expired,
    NotYetValid,
    MissingRole,
}

/// Verifies (and, for tooling, signs) session tokens against one shared secret.
#[derive(Clone)]
pub struct SessionVerifier {
    key: Vec<u8>,
    require_role_claim: bool,
}

impl fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("key", &"<redacted>")
            .field("require_role_claim", &self.require_role_claim)
            .finish()
    }
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self { key: secret.as_bytes().to_vec(), require_role_claim: false }
    }

    /// Reject tokens without a `role` claim instead of defaulting to superadmin.
    pub fn require_role_claim(mut self, on: bool) -> Self {
        self.require_role_claim = on;
        self
    }

    /// Verify the raw cookie value against the current wall clock.
    pub fn verify(&self, cookie: Option<&str>) -> Result<Identity, AuthError> {
        self.verify_at(cookie, chrono::Utc::now().timestamp())
    }

    /// Verify the raw cookie value as of `now` (unix seconds).
    pub fn verify_at(&self, cookie: Option<&str>, now: i64) -> Result<Identity, AuthError> {
        let Some(raw) = cookie else {
            tracing::debug!(target: "auth", "no session cookie");
            return Err(AuthError::Unauthenticated);
        };
        match self.decode(raw.trim(), now) {
            Ok(claims) => {
                let role = claims.role.unwrap_or_else(|| DEFAULT_ROLE.to_string());
                Ok(Identity { username: claims.username, role })
            }
            Err(reason) => {
                tracing::debug!(target: "auth", ?reason, "session token rejected");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    fn decode(&self, token: &str, now: i64) -> Result<SessionClaims, Rejection> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Rejection::Malformed);
        };

        let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| Rejection::Malformed)?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|_| Rejection::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(Rejection::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| Rejection::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| Rejection::Malformed)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&signature).map_err(|_| Rejection::BadSignature)?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| Rejection::Malformed)?;
        let claims: SessionClaims = serde_json::from_slice(&payload).map_err(|_| Rejection::Malformed)?;

        if let Some(exp) = claims.exp {
            if now >= exp {
                return Err(Rejection::Expired);
            }
        }
        if let Some(nbf) = claims.nbf {
            if now < nbf {
                return Err(Rejection::NotYetValid);
            }
        }
        if self.require_role_claim && claims.role.is_none() {
            return Err(Rejection::MissingRole);
        }
        Ok(claims)
    }

    /// Sign `claims` into a token this verifier accepts.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        let header = TokenHeader { alg: ALGORITHM.to_string(), typ: Some("JWT".to_string()) };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);

        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| anyhow!("hmac key: {e}"))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{header_b64}.{payload_b64}.{sig_b64}"))
    }
}
