// ============================
// watchparty-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod credentials;
pub mod session;
pub mod token_generator;

pub use credentials::{hash_password, verify_password, CredentialCheck, CredentialStore};
pub use session::{ConnectionId, Session, SessionDirectory};
pub use token_generator::{generate_party_id, generate_secure_token};
