// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for authentication
This module provides random party identifiers and the bearer tokens
that a client presents when it opens its realtime connection. */
use rand::{Rng, RngCore};

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Length of a generated party ID
pub const PARTY_ID_LENGTH: usize = 8;

const PARTY_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/** Generate a cryptographically secure random token
The thread-local generator is a CSPRNG seeded from the OS.
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Short lowercase alphanumeric party ID. Callers retry on collision.
pub fn generate_party_id() -> String {
    let mut rng = rand::rng();
    (0..PARTY_ID_LENGTH)
        .map(|_| PARTY_ID_ALPHABET[rng.random_range(0..PARTY_ID_ALPHABET.len())] as char)
        .collect()
}
