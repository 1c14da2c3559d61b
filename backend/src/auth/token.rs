//! Time-limited, tamper-evident tokens.
//!
//! A token is `base64url(payload) "." base64url(hmac)`, where the payload is
//! the JSON of the purpose claims plus `iat` and `exp` (Unix seconds) and the
//! HMAC-SHA256 covers the encoded payload segment. Purposes are told apart by
//! their claim keys: a token minted for one purpose does not decode as
//! another.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmClaims {
    pub confirm: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    pub reset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEmailClaims {
    pub change_email: i64,
    pub new_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub id: i64,
}

#[derive(Serialize)]
struct Outgoing<'a, T> {
    #[serde(flatten)]
    claims: &'a T,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct Incoming {
    exp: i64,
    #[serde(flatten)]
    claims: serde_json::Value,
}

/// Failure while minting a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to encode token payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid signing key")]
    Key,
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token was issued for another purpose")]
    WrongPurpose,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Arc<[u8]>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Key)
    }

    /// Signs `claims`, valid for `expires_in` seconds from now.
    pub fn sign<T: Serialize>(&self, claims: &T, expires_in: i64) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let payload = serde_json::to_vec(&Outgoing {
            claims,
            iat,
            exp: iat.saturating_add(expires_in),
        })?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verifies signature and expiry, then decodes the purpose claims.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenRejection> {
        let (payload, signature) = token.split_once('.').ok_or(TokenRejection::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenRejection::Malformed)?;

        let mut mac = self.mac().map_err(|_| TokenRejection::BadSignature)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenRejection::BadSignature)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenRejection::Malformed)?;
        let incoming: Incoming =
            serde_json::from_slice(&bytes).map_err(|_| TokenRejection::Malformed)?;

        if Utc::now().timestamp() >= incoming.exp {
            return Err(TokenRejection::Expired);
        }

        serde_json::from_value(incoming.claims).map_err(|_| TokenRejection::WrongPurpose)
    }

    /// Like [`decode`](Self::decode), but every rejection collapses to `None`.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        match self.decode(token) {
            Ok(claims) => Some(claims),
            Err(reason) => {
                tracing::debug!(%reason, "rejected signed token");
                None
            }
        }
    }
}
