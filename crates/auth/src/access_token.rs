//! Opaque access-token verification.
//!
//! Tokens are never stored in clear. Each row keeps a salted PBKDF2 hash of
//! the secret and its last eight characters, which act as a non-secret lookup
//! key: the store narrows candidates by suffix, and the verifier recomputes
//! the hash of each candidate in constant time.

use chrono::{DateTime, Datelike, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use gatekeep_core::{StorageError, UserId};

use crate::store::AccessTokenStore;

/// Length of the public lookup suffix.
pub const TOKEN_LOOKUP_LEN: usize = 8;

const PBKDF2_ROUNDS: u32 = 10_000;
const HASH_LEN: usize = 50;
const TOKEN_BYTES: usize = 20;
const SALT_BYTES: usize = 16;

/// Persisted access-token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Owning user.
    pub uid: UserId,
    pub name: String,
    /// Hex-encoded PBKDF2 output.
    pub token_hash: String,
    pub token_salt: String,
    /// Lookup key only; never used for authorization.
    pub token_last_eight: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_used: bool,
    /// `None` means the token never expires.
    #[serde(default, deserialize_with = "deserialize_expiry")]
    pub exp_date: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Not expired at `now`: no expiry, or expiry strictly in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.exp_date.is_none_or(|exp| exp > now)
    }

    fn matches(&self, token: &str) -> bool {
        let computed = hash_token(token, &self.token_salt);
        self.token_hash.as_bytes().ct_eq(computed.as_bytes()).into()
    }
}

/// Rows written with the zero timestamp (year 1) never expire.
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(raw.filter(|t| t.year() > 1))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessTokenError {
    /// Covers every rejection: malformed, unknown, mismatched or expired.
    #[error("access token doesn't exist")]
    NotExist,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Salted iterated hash of `token`, hex-encoded.
pub fn hash_token(token: &str, salt: &str) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(token.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out);
    hex::encode(out)
}

/// Last `TOKEN_LOOKUP_LEN` characters of `token`, if it is long enough.
pub fn lookup_suffix(token: &str) -> Option<&str> {
    let start = token.char_indices().rev().nth(TOKEN_LOOKUP_LEN - 1)?.0;
    Some(&token[start..])
}

/// Verifies presented tokens against the store.
#[derive(Debug, Clone)]
pub struct AccessTokenVerifier<S> {
    store: S,
}

impl<S> AccessTokenVerifier<S>
where
    S: AccessTokenStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn verify(&self, token: &str) -> Result<AccessToken, AccessTokenError> {
        self.verify_at(token, Utc::now()).await
    }

    /// Verify `token` as of `now`.
    pub async fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, AccessTokenError> {
        // Dotted tokens belong to the session format.
        if token.contains('.') {
            return Err(AccessTokenError::NotExist);
        }
        let Some(suffix) = lookup_suffix(token) else {
            return Err(AccessTokenError::NotExist);
        };

        let candidates = self.store.candidates_by_suffix(suffix).await?;
        tracing::debug!(candidates = candidates.len(), "access token candidates fetched");

        candidates
            .into_iter()
            .find(|candidate| candidate.matches(token) && candidate.is_valid_at(now))
            .ok_or(AccessTokenError::NotExist)
    }
}

/// A freshly minted token: the plaintext is only available here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub record: AccessToken,
}

/// Mint a random token for `uid` and the row to persist for it.
pub fn issue_token(
    uid: UserId,
    name: impl Into<String>,
    exp_date: Option<DateTime<Utc>>,
) -> IssuedToken {
    let mut rng = rand::thread_rng();
    let mut secret = [0u8; TOKEN_BYTES];
    let mut salt = [0u8; SALT_BYTES];
    rng.fill_bytes(&mut secret);
    rng.fill_bytes(&mut salt);

    let plaintext = hex::encode(secret);
    let token_salt = hex::encode(salt);
    let now = Utc::now();

    let record = AccessToken {
        uid,
        name: name.into(),
        token_hash: hash_token(&plaintext, &token_salt),
        token_last_eight: plaintext[plaintext.len() - TOKEN_LOOKUP_LEN..].to_string(),
        token_salt,
        created_at: now,
        updated_at: Some(now),
        has_used: false,
        exp_date,
    };

    IssuedToken { plaintext, record }
}
