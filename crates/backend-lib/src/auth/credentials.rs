// ============================
// watchparty-backend/src/auth/credentials.rs
// ============================
//! Username/password registry. The first password seen for a username wins.
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use rand::RngCore;
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};

use crate::error::AppError;

const SALT_BYTES: usize = 16;
const HASH_LEN: usize = 32;

/// Outcome of a successful credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// Username was unknown and is now bound to this password
    Registered,
    /// Password matched the stored one
    Verified,
}

/// Hash a password using scrypt with the given cost
pub fn hash_password(plain: &str, params: Params) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;

    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Process-lifetime credential store
#[derive(Clone)]
pub struct CredentialStore {
    hashes: Arc<DashMap<String, String>>,
    params: Params,
}

impl CredentialStore {
    /// Create a store hashing with scrypt `log_n` (r = 8, p = 1)
    pub fn new(log_n: u8) -> Result<Self, AppError> {
        let params = Params::new(log_n, 8, 1, HASH_LEN)
            .map_err(|e| AppError::Internal(format!("invalid scrypt parameters: {e}")))?;
        Ok(Self {
            hashes: Arc::new(DashMap::new()),
            params,
        })
    }

    /// Register `username` or verify `password` against its stored hash.
    /// Hashing runs on the blocking pool.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialCheck, AppError> {
        let store = self.clone();
        let username = username.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || store.authenticate_blocking(&username, &password))
            .await?
    }

    /// Synchronous variant of [`CredentialStore::authenticate`]
    pub fn authenticate_blocking(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialCheck, AppError> {
        let existing = self.hashes.get(username).map(|entry| entry.value().clone());
        if let Some(hash) = existing {
            return Self::check(&hash, password);
        }

        let hash = hash_password(password, self.params)?;
        match self.hashes.entry(username.to_string()) {
            // lost a race against another first registration
            Entry::Occupied(entry) => {
                let stored = entry.get().clone();
                drop(entry);
                Self::check(&stored, password)
            },
            Entry::Vacant(entry) => {
                entry.insert(hash);
                Ok(CredentialCheck::Registered)
            },
        }
    }

    fn check(hash: &str, password: &str) -> Result<CredentialCheck, AppError> {
        if verify_password(hash, password) {
            Ok(CredentialCheck::Verified)
        } else {
            Err(AppError::Auth("password does not match".to_string()))
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.hashes.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
