//! Email and password acceptance rules.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CryptoError, CryptoResult};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that satisfy the "special character" rule.
pub const SPECIAL_CHARACTERS: &str = "@$!%*?&";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$")
            .unwrap_or_else(|e| unreachable!("email pattern is a literal: {e}"))
    })
}

/// Whether `email` is shaped like `local@domain.tld`.
pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Like [`validate_email`], as a `Result`.
pub fn require_email(email: &str) -> CryptoResult<()> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(CryptoError::InvalidEmail)
    }
}

/// Check a password against the policy.
///
/// Rules are checked in a fixed order and the first failure is reported:
/// length, uppercase, lowercase, digit, special character.
pub fn validate_password(password: &str) -> CryptoResult<()> {
    let weak = |msg: &str| Err(CryptoError::WeakPassword(msg.to_string()));

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return weak("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return weak("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return weak("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return weak("Password must contain at least one digit");
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return weak("Password must contain at least one special character (@$!%*?&)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("student@school.kr"));
        assert!(validate_email("first.last+tag@mail-host.co.kr"));
        assert!(require_email("a_b@c.io").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!validate_email(""));
        assert!(!validate_email("no-at-sign.com"));
        assert!(!validate_email("user@nodot"));
        assert!(!validate_email("user@@host.com"));
        assert!(!validate_email("us er@host.com"));
        assert!(matches!(
            require_email("bad"),
            Err(CryptoError::InvalidEmail)
        ));
    }

    #[test]
    fn test_valid_password() {
        assert!(validate_password("Passw0rd!").is_ok());
        assert!(validate_password("aB3&aaaa").is_ok());
    }

    fn rule_for(password: &str) -> String {
        match validate_password(password) {
            Err(CryptoError::WeakPassword(msg)) => msg,
            other => panic!("expected weak password, got {other:?}"),
        }
    }

    #[test]
    fn test_password_too_short() {
        assert!(rule_for("Ab1!").contains("8 characters"));
    }

    #[test]
    fn test_password_missing_uppercase() {
        assert!(rule_for("passw0rd!").contains("uppercase"));
    }

    #[test]
    fn test_password_missing_lowercase() {
        assert!(rule_for("PASSW0RD!").contains("lowercase"));
    }

    #[test]
    fn test_password_missing_digit() {
        assert!(rule_for("Password!").contains("digit"));
    }

    #[test]
    fn test_password_missing_special() {
        assert!(rule_for("Passw0rdd").contains("special"));
        // '#' is not in the accepted set
        assert!(rule_for("Passw0rd#").contains("special"));
    }

    #[test]
    fn test_password_length_counts_chars_not_bytes() {
        // 7 chars, more than 8 bytes
        assert!(rule_for("Aé1!ééé").contains("8 characters"));
    }
}
