//! Input validation for contact and account fields.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Invalid phone number.
    InvalidPhone(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Value too short.
    TooShort { field: String, min: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::InvalidPhone(msg) => write!(f, "Invalid phone number: {}", msg),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Minimum password length at signup.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum length of a team note.
pub const MAX_NOTE_LENGTH: usize = 4000;

/// Validate an email address: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail("missing @".to_string()));
    };

    if domain.contains('@') {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    }

    if local.is_empty() {
        return Err(ValidationError::InvalidEmail("missing local part".to_string()));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(ValidationError::InvalidEmail(format!("bad domain '{}'", domain)));
    }

    Ok(())
}

/// Normalize a phone number to E.164.
///
/// Formatting characters are stripped. Ten-digit numbers without a country
/// code are treated as North American.
pub fn normalize_phone(phone: &str) -> Result<String, ValidationError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("phone".to_string()));
    }

    let has_plus = trimmed.starts_with('+');
    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '+' | ' ' | '-' | '(' | ')' | '.' => {}
            other => {
                return Err(ValidationError::InvalidPhone(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }

    let normalized = match (has_plus, digits.len()) {
        (true, 8..=15) => format!("+{}", digits),
        (false, 10) => format!("+1{}", digits),
        (false, 11) if digits.starts_with('1') => format!("+{}", digits),
        _ => {
            return Err(ValidationError::InvalidPhone(format!(
                "'{}' is not a dialable number",
                trimmed
            )))
        }
    };

    Ok(normalized)
}

/// Validate a signup password.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Empty("password".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Validate a team note.
pub fn validate_note(note: &str) -> Result<(), ValidationError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(ValidationError::Empty("note".to_string()));
    }
    if note.len() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LENGTH,
            actual: note.len(),
        });
    }
    Ok(())
}
