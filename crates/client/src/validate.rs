//! Client-side pre-checks. A failed pre-check resolves locally and never
//! produces a network request.

use crate::error::ApiError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 6;
pub const MESSAGE_MAX: usize = 5000;

/// Username length pre-check (3–150 characters).
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        return Err(ApiError::Validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    Ok(())
}

/// Password length pre-check (at least 6 characters).
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::Validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

/// Message pre-check: non-empty after trimming, at most 5000 characters.
/// Returns the trimmed text that should go on the wire.
pub fn validate_message_text(text: &str) -> Result<&str, ApiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("message text must not be empty".into()));
    }
    if trimmed.chars().count() > MESSAGE_MAX {
        return Err(ApiError::Validation(format!(
            "message text must be at most {MESSAGE_MAX} characters"
        )));
    }
    Ok(trimmed)
}
