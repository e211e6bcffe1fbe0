//! Purpose-scoped signed tokens for emailed action links.
//!
//! A token binds a `{user_id, event_id}` pair to a purpose ("book", "cancel",
//! "present", "absent"). The purpose is mixed into the signing key as a salt,
//! so a token minted for one action never verifies for another. Tokens carry
//! no expiry and need no server-side storage.
//!
//! Wire format: `base64url(json_payload):base64url(hmac_sha256)`, both parts
//! without padding, which keeps the token safe to embed in a URL path.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Namespace mixed into every derived key.
const KEY_NAMESPACE: &str = "atelier.signing.";

/// Separator between the payload and the signature.
const SEPARATOR: char = ':';

/// Error type for token operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Signature mismatch, wrong purpose or malformed input.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Signing key rejected: {0}")]
    InvalidKey(String),

    #[error("Failed to encode token payload: {0}")]
    Encoding(String),
}

/// The action a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Book,
    Cancel,
    Present,
    Absent,
}

impl TokenPurpose {
    /// All purposes, in display order.
    pub const ALL: [TokenPurpose; 4] = [
        TokenPurpose::Book,
        TokenPurpose::Cancel,
        TokenPurpose::Present,
        TokenPurpose::Absent,
    ];

    /// The salt string used when signing.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Book => "book",
            TokenPurpose::Cancel => "cancel",
            TokenPurpose::Present => "present",
            TokenPurpose::Absent => "absent",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(TokenPurpose::Book),
            "cancel" => Ok(TokenPurpose::Cancel),
            "present" => Ok(TokenPurpose::Present),
            "absent" => Ok(TokenPurpose::Absent),
            _ => Err(format!("Unknown token purpose: {}", s)),
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user_id: i64,
    pub event_id: i64,
}

/// Mints and verifies purpose-scoped tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenSigner {
    /// Creates a signer from the configured secret key.
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidKey("secret must not be empty".into()));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    /// Mints a token for `(user_id, event_id)` scoped to `purpose`.
    pub fn mint(
        &self,
        user_id: i64,
        event_id: i64,
        purpose: TokenPurpose,
    ) -> Result<String, TokenError> {
        self.mint_with_salt(&TokenPayload { user_id, event_id }, purpose.as_str())
    }

    /// Verifies a token minted for `purpose` and returns its payload.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenPayload, TokenError> {
        self.verify_with_salt(token, purpose.as_str())
    }

    /// Mints a token under an arbitrary salt.
    pub fn mint_with_salt(&self, payload: &TokenPayload, salt: &str) -> Result<String, TokenError> {
        let json = serde_json::to_vec(payload).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac_for(salt)?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}{}{}", encoded, SEPARATOR, signature))
    }

    /// Verifies a token under an arbitrary salt.
    pub fn verify_with_salt(&self, token: &str, salt: &str) -> Result<TokenPayload, TokenError> {
        let (encoded, signature) = token
            .split_once(SEPARATOR)
            .ok_or(TokenError::InvalidToken)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::InvalidToken)?;

        let mut mac = self.mac_for(salt)?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidToken)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::InvalidToken)?;
        serde_json::from_slice(&json).map_err(|_| TokenError::InvalidToken)
    }

    /// HMAC keyed by SHA-256(namespace + salt + "signer" + secret).
    fn mac_for(&self, salt: &str) -> Result<HmacSha256, TokenError> {
        let mut hasher = Sha256::new();
        hasher.update(KEY_NAMESPACE.as_bytes());
        hasher.update(salt.as_bytes());
        hasher.update(b"signer");
        hasher.update(&self.secret);
        let key = hasher.finalize();

        HmacSha256::new_from_slice(&key).map_err(|e| TokenError::InvalidKey(e.to_string()))
    }
}
