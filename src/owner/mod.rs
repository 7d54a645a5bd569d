//! Owner credentials for pot management links.
//!
//! Two credentials grant management rights over a pot:
//!
//! - the **owner code**, a short base32 string shown to the organizer once and
//!   stored only as `sha256("pp_salt_" + code)`;
//! - the **owner token**, `b64url(pot_id "." ts) "." b64url(mac[..16])` where
//!   `mac = HMAC-SHA256(secret "|" salt, pot_id "." ts)`.
//!
//! Tokens are bound to the pot's current salt, so drawing a new salt revokes
//! every token issued before it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated owner code.
pub const OWNER_CODE_LEN: usize = 10;

/// RFC 4648 base32 alphabet.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const CODE_HASH_PREFIX: &str = "pp_salt_";

/// Truncated MAC length in bytes.
const MAC_LEN: usize = 16;

/// Clock skew tolerated for tokens stamped in the future.
const FUTURE_SKEW_SECS: i64 = 60;

/// Why an owner token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerTokenError {
    Malformed,
    WrongPot,
    BadSignature,
    Expired,
}

impl std::fmt::Display for OwnerTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            OwnerTokenError::Malformed => "malformed owner token",
            OwnerTokenError::WrongPot => "owner token belongs to another pot",
            OwnerTokenError::BadSignature => "owner token signature mismatch",
            OwnerTokenError::Expired => "owner token expired",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for OwnerTokenError {}

/// Plaintext owner code. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnerCode(String);

impl OwnerCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::ops::Deref for OwnerCode {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for OwnerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerCode(..)")
    }
}

/// Freshly minted credentials for a pot. The plaintext code exists only here.
#[derive(Debug, Clone)]
pub struct IssuedOwnerCredentials {
    pub code: OwnerCode,
    pub code_hash: String,
    pub salt: String,
    pub token: String,
}

/// Issues and verifies owner tokens with a server-wide secret.
#[derive(Clone)]
pub struct OwnerCredentials {
    secret: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for OwnerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerCredentials")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl OwnerCredentials {
    /// `ttl_secs == 0` disables expiry.
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    /// Credentials keyed with a random per-process secret.
    /// Tokens issued this way stop verifying after a restart.
    pub fn ephemeral(ttl_secs: u64) -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(hex::encode(key), ttl_secs)
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Mint code, salt and token for a newly created pot.
    pub fn issue(&self, pot_id: &str) -> Result<IssuedOwnerCredentials, AppError> {
        let code = generate_owner_code();
        let salt = generate_salt();
        let token = self.make_owner_token(pot_id, &salt)?;
        Ok(IssuedOwnerCredentials {
            code_hash: hash_owner_code(&code),
            code,
            salt,
            token,
        })
    }

    pub fn make_owner_token(&self, pot_id: &str, salt: &str) -> Result<String, AppError> {
        self.make_owner_token_at(pot_id, salt, Utc::now().timestamp())
    }

    pub fn make_owner_token_at(
        &self,
        pot_id: &str,
        salt: &str,
        issued_at: i64,
    ) -> Result<String, AppError> {
        let payload = format!("{}.{}", pot_id, issued_at);
        let mac = self
            .mac(salt, payload.as_bytes())
            .ok_or_else(|| AppError::Internal("Invalid owner token key".to_string()))?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(mac)
        ))
    }

    pub fn verify_owner_token(
        &self,
        token: &str,
        pot_id: &str,
        salt: &str,
    ) -> Result<(), OwnerTokenError> {
        self.verify_owner_token_at(token, pot_id, salt, Utc::now().timestamp())
    }

    pub fn verify_owner_token_at(
        &self,
        token: &str,
        pot_id: &str,
        salt: &str,
        now: i64,
    ) -> Result<(), OwnerTokenError> {
        let (payload_b64, mac_b64) = token
            .trim()
            .split_once('.')
            .ok_or(OwnerTokenError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| OwnerTokenError::Malformed)?;
        let provided_mac = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| OwnerTokenError::Malformed)?;
        let payload_str =
            std::str::from_utf8(&payload).map_err(|_| OwnerTokenError::Malformed)?;

        // Pot ids may contain dots; the timestamp never does.
        let (embedded_pot, ts) = payload_str
            .rsplit_once('.')
            .ok_or(OwnerTokenError::Malformed)?;
        let issued_at: i64 = ts.parse().map_err(|_| OwnerTokenError::Malformed)?;

        if embedded_pot != pot_id {
            return Err(OwnerTokenError::WrongPot);
        }

        let expected = self
            .mac(salt, &payload)
            .ok_or(OwnerTokenError::BadSignature)?;
        if provided_mac.len() != expected.len() || !bool::from(provided_mac.ct_eq(&expected)) {
            return Err(OwnerTokenError::BadSignature);
        }

        if self.ttl_secs > 0 {
            let age = now - issued_at;
            let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
            if age > ttl || age < -FUTURE_SKEW_SECS {
                return Err(OwnerTokenError::Expired);
            }
        }

        Ok(())
    }

    fn mac(&self, salt: &str, payload: &[u8]) -> Option<Vec<u8>> {
        let key = format!("{}|{}", self.secret, salt);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
        mac.update(payload);
        let full = mac.finalize().into_bytes();
        full.get(..MAC_LEN).map(<[u8]>::to_vec)
    }
}

/// Random owner code over the base32 alphabet.
pub fn generate_owner_code() -> OwnerCode {
    let mut rng = rand::thread_rng();
    let code = (0..OWNER_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect();
    OwnerCode(code)
}

/// 16 random bytes as hex.
pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Codes are case-insensitive on input.
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Lowercase hex of `sha256("pp_salt_" + code)`.
pub fn hash_owner_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CODE_HASH_PREFIX.as_bytes());
    hasher.update(normalize_code(code).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_owner_code(code: &str, stored_hash: &str) -> bool {
    let computed = hash_owner_code(code);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
