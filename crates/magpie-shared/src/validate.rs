//! Input validation applied before any backend call.
//!
//! Validation failures are terminal for the attempted operation and never
//! reach a collaborator.

use crate::constants::{MAX_MESSAGE_TEXT, MIN_PASSWORD_LEN};
use crate::error::ValidationError;

/// Check an email address the way the sign-in form does: a non-empty local
/// part, exactly one `@`, a dotted domain, and no whitespace anywhere.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err(ValidationError::InvalidEmail),
    };

    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    // The domain needs a dot with at least one character on each side.
    match domain.rfind('.') {
        Some(i) if i > 0 && i + 1 < domain.len() => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// Minimum-length password check.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Reject message text that is empty after trimming, or oversized.
pub fn validate_message_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_TEXT {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        for email in [
            "user@example.com",
            "a@b.co",
            "first.last@mail.example.org",
            "user+tag@example.io",
        ] {
            assert_eq!(validate_email(email), Ok(()), "{}", email);
        }
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "plain",
            "@example.com",
            "user@",
            "user@domain",
            "user@.com",
            "user@domain.",
            "us er@example.com",
            "user@exa mple.com",
            "user@@example.com",
            "user@do@main.com",
        ] {
            assert_eq!(
                validate_email(email),
                Err(ValidationError::InvalidEmail),
                "{}",
                email
            );
        }
    }

    #[test]
    fn test_password_length() {
        assert_eq!(
            validate_password("12345"),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(validate_password("123456"), Ok(()));
    }

    #[test]
    fn test_message_text() {
        assert_eq!(
            validate_message_text(""),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(
            validate_message_text("   \n\t "),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(validate_message_text("hello"), Ok(()));

        let huge = "x".repeat(MAX_MESSAGE_TEXT + 1);
        assert_eq!(
            validate_message_text(&huge),
            Err(ValidationError::MessageTooLong)
        );
    }
}
