//! Common validation utilities.
//!
//! All three identity collections share a single email namespace, so every
//! read and write goes through [`normalize_email`] first.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Minimum password length for registration forms.
const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length (argon2 input is unbounded, this guards abuse).
const MAX_PASSWORD_LEN: usize = 128;

lazy_static! {
    // Intentionally permissive; the mail provider is the real authority.
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Normalizes an email address for storage and lookup.
///
/// Lowercases and trims surrounding whitespace. Uniqueness checks across the
/// admin/doctor/patient collections operate on this form only.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates the shape of an email address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Invalid email address".into());
        Err(err)
    }
}

/// Validates password strength for registration forms.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        let mut err = ValidationError::new("password_too_short");
        err.message = Some("Password must be at least 8 characters".into());
        return Err(err);
    }
    if password.len() > MAX_PASSWORD_LEN {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some("Password must be at most 128 characters".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a display name is non-empty and reasonably sized.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 120 {
        let mut err = ValidationError::new("display_name");
        err.message = Some("Name must be between 1 and 120 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Dr.House@Clinic.COM "), "dr.house@clinic.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_validate_email_accepts_generated_addresses() {
        for _ in 0..20 {
            let email: String = SafeEmail().fake();
            assert!(validate_email(&email).is_ok(), "rejected {}", email);
        }
    }

    #[test]
    fn test_validate_email_rejects_malformed() {
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("two@@x.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"a".repeat(129)).is_err());
        assert!(validate_password(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Dr. Gregory House").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(121)).is_err());
    }
}
