/// Input validation rules for credentials
use crate::error::ValidationError;

/// Normalize an email for storage and lookup: trimmed, ASCII-lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Check the basic `local@domain.tld` shape. Not an RFC parser; the
/// mailer is the final arbiter of deliverability.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    // Domain needs at least one dot with non-empty labels on both sides
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

/// Password policy: minimum 8 characters, at least one letter and one digit.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.len() >= 8;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_passwords() {
        assert!(validate_password("abcdefg1").is_ok());
        assert!(validate_password("Passw0rd!").is_ok());
    }

    #[test]
    fn rejects_weak_passwords() {
        assert_eq!(validate_password("short1"), Err(ValidationError::WeakPassword));
        assert_eq!(
            validate_password("nodigitshere"),
            Err(ValidationError::WeakPassword)
        );
        assert_eq!(validate_password("12345678"), Err(ValidationError::WeakPassword));
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Mario@Example.COM "), "mario@example.com");
    }

    #[test]
    fn validates_email_shape() {
        assert!(validate_email("mario@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.co").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user@.leadingdot").is_err());
        assert!(validate_email("user@trailingdot.").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }
}
