/// Input validators for account fields
///
/// Each validator trims its input and returns the normalised value:
/// emails and usernames come back lowercased.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 256;
const MAX_USERNAME_LENGTH: usize = 30;
// bcrypt only looks at the first 72 bytes
const MAX_PASSWORD_LENGTH: usize = 72;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap();
}

/// Validates an email address and lowercases it
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("full_name".to_string()));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("full_name".to_string(), MAX_NAME_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("full_name".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a username and lowercases it
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let normalised = username.trim().to_lowercase();

    if normalised.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }
    if normalised.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }
    if !USERNAME_REGEX.is_match(&normalised) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(normalised)
}

/// Checks a password is present. The password itself is never trimmed or
/// otherwise rewritten.
pub fn is_valid_password(field: &str, password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_PASSWORD_LENGTH));
    }
    Ok(())
}
