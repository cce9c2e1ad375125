//! One-time email verification codes.

use rand::Rng;

/// Lowest code value (codes never start with 0).
pub const CODE_MIN: u32 = 100_000;

/// Highest code value.
pub const CODE_MAX: u32 = 999_999;

/// Generate a 6-digit verification code.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Compare a submitted code with the stored one, ignoring surrounding whitespace.
pub fn codes_match(submitted: &str, stored: &str) -> bool {
    let submitted = submitted.trim();
    !submitted.is_empty() && submitted == stored.trim()
}
