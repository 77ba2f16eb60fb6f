// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for HTTP bodies and realtime frames.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_USERNAME_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_PARTY_ID_LENGTH: usize = 32;
const MAX_VIDEO_URL_LENGTH: usize = 2048;
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 2000;

static PARTY_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    Username(String),

    #[error("Invalid password: {0}")]
    Password(String),

    #[error("Invalid party ID: {0}")]
    PartyId(String),

    #[error("Invalid video URL: {0}")]
    VideoUrl(String),

    #[error("Invalid chat message: {0}")]
    ChatMessage(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a username
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if username.trim().is_empty() {
        return Err(ValidationError::Username(
            "Username must not be empty".to_string(),
        ));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::Username(format!(
            "Username cannot exceed {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if username.chars().any(char::is_control) {
        return Err(ValidationError::Username(
            "Username contains control characters".to_string(),
        ));
    }

    Ok(username)
}

/// Validate a password. No complexity rules: any non-empty password is accepted.
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    if password.is_empty() {
        return Err(ValidationError::Password(
            "Password must not be empty".to_string(),
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::Password(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(password)
}

/// Validate a party ID
pub fn validate_party_id(party_id: &str) -> ValidationResult<&str> {
    if party_id.is_empty() || party_id.len() > MAX_PARTY_ID_LENGTH {
        return Err(ValidationError::PartyId(format!(
            "Party ID must be between 1 and {MAX_PARTY_ID_LENGTH} characters"
        )));
    }

    if !PARTY_ID_REGEX.is_match(party_id) {
        return Err(ValidationError::PartyId(
            "Party ID must contain only lowercase letters and digits".to_string(),
        ));
    }

    Ok(party_id)
}

/// Validate a source video URL before it is handed to the transcoder
pub fn validate_video_url(url: &str) -> ValidationResult<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::VideoUrl(
            "Video URL must not be empty".to_string(),
        ));
    }

    if url.len() > MAX_VIDEO_URL_LENGTH {
        return Err(ValidationError::VideoUrl(format!(
            "Video URL cannot exceed {MAX_VIDEO_URL_LENGTH} characters"
        )));
    }

    // would be parsed as a transcoder flag
    if url.starts_with('-') {
        return Err(ValidationError::VideoUrl(
            "Video URL must not start with '-'".to_string(),
        ));
    }

    Ok(url)
}

/// Validate a chat line
pub fn validate_chat_message(message: &str) -> ValidationResult<&str> {
    if message.chars().count() > MAX_CHAT_MESSAGE_LENGTH {
        return Err(ValidationError::ChatMessage(format!(
            "Chat message cannot exceed {MAX_CHAT_MESSAGE_LENGTH} characters"
        )));
    }

    Ok(message)
}
