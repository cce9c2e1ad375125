//! # counsel-crypto
//!
//! Credential primitives for the counseling backend.
//!
//! - **Password hashing**: Argon2id PHC strings
//! - **Credential policy**: email shape and password strength rules
//! - **Session tokens**: HS256 JWT access/refresh pairs and password-reset tokens
//! - **Verification codes**: 6-digit one-time codes for email confirmation
//!
//! ## Example
//!
//! ```rust
//! use counsel_crypto::{TokenIssuer, TokenKind, validate_password};
//!
//! validate_password("Passw0rd!").unwrap();
//!
//! let issuer = TokenIssuer::new(b"server-secret");
//! let user_id = uuid::Uuid::new_v4();
//! let pair = issuer.issue_pair(user_id).unwrap();
//! let claims = issuer.verify(&pair.access_token, TokenKind::Access).unwrap();
//! assert_eq!(claims.user_id, user_id);
//! ```

pub mod code;
pub mod error;
pub mod password;
pub mod policy;
pub mod token;

pub use code::{codes_match, generate_verification_code};
pub use error::{CryptoError, CryptoResult};
pub use password::{hash_password, hash_password_with, verify_password, HashParams};
pub use policy::{require_email, validate_email, validate_password};
pub use token::{Claims, TokenIssuer, TokenKind, TokenPair};
