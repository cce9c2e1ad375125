//! Account lifecycle: registration with emailed codes, login, token refresh
//! and revocation, password reset and withdrawal.
//!
//! The current access and refresh token of every user are kept in the
//! ephemeral store. A token is only honored while it is the stored one, so
//! logging out or resetting the password revokes it immediately.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use counsel_core::{defaults, Error, Result};
use counsel_crypto::{
    codes_match, generate_verification_code, hash_password, require_email, validate_password,
    verify_password, CryptoError, TokenIssuer, TokenKind, TokenPair,
};
use counsel_db::PgUserRepository;

use super::ephemeral::{
    access_token_key, code_request_key, password_reset_key, pending_user_key,
    refresh_token_key, registration_request_key, verification_code_key, EphemeralStore,
};
use super::mailer::{Email, Mailer};

/// Map credential failures onto the shared error type.
pub fn credential_error(err: CryptoError) -> Error {
    match err {
        CryptoError::InvalidEmail | CryptoError::WeakPassword(_) => {
            Error::InvalidInput(err.to_string())
        }
        CryptoError::TokenExpired
        | CryptoError::TokenInvalid(_)
        | CryptoError::WrongTokenKind { .. } => Error::Unauthorized(err.to_string()),
        CryptoError::Hash(_) | CryptoError::Encoding(_) => Error::Internal(err.to_string()),
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: PgUserRepository,
    store: EphemeralStore,
    mailer: Arc<dyn Mailer>,
    tokens: TokenIssuer,
    base_url: String,
}

impl AccountService {
    pub fn new(
        users: PgUserRepository,
        store: EphemeralStore,
        mailer: Arc<dyn Mailer>,
        tokens: TokenIssuer,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            store,
            mailer,
            tokens,
            base_url: base_url.into(),
        }
    }

    /// Create an unverified account and email its verification code.
    pub async fn register(&self, email: &str, password: &str, confirm: &str) -> Result<()> {
        require_email(email).map_err(credential_error)?;
        if self.users.exists(email).await? {
            return Err(Error::Conflict("Email already registered".to_string()));
        }
        if password != confirm {
            return Err(Error::InvalidInput("Passwords do not match".to_string()));
        }
        validate_password(password).map_err(credential_error)?;
        if self.store.exists(&registration_request_key(email)).await? {
            return Err(Error::RateLimited(
                "Email verification already in progress, try again later".to_string(),
            ));
        }

        let hash = hash_blocking(password.to_string()).await?;
        let user_id = self.users.create(email, &hash).await?;
        self.store
            .set_ex(
                &registration_request_key(email),
                "requested",
                secs(defaults::REGISTRATION_PENDING_SECS),
            )
            .await?;
        info!(subsystem = "auth", op = "register", user_id = %user_id, "Account created");

        self.send_code(email).await
    }

    /// Generate, store and email a fresh code. Throttled per address.
    pub async fn send_code(&self, email: &str) -> Result<()> {
        require_email(email).map_err(credential_error)?;
        if self.store.exists(&code_request_key(email)).await? {
            return Err(Error::RateLimited(
                "Verification code requested too often, try again later".to_string(),
            ));
        }

        let code = generate_verification_code();
        self.store
            .set_ex(
                &verification_code_key(email),
                &code,
                secs(defaults::VERIFICATION_CODE_TTL_SECS),
            )
            .await?;
        self.store
            .set_ex(
                &code_request_key(email),
                "requested",
                secs(defaults::VERIFICATION_RESEND_SECS),
            )
            .await?;

        self.mailer
            .send(&Email {
                to: email.to_string(),
                subject: "이메일 인증 코드".to_string(),
                text: format!(
                    "인증 코드: {code}\n\n이 코드는 {}분 동안 유효합니다.",
                    defaults::VERIFICATION_CODE_TTL_SECS / 60
                ),
            })
            .await
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<()> {
        let key = verification_code_key(email);
        let stored = self.store.get(&key).await?.ok_or_else(|| {
            Error::InvalidInput("Verification code expired or not requested".to_string())
        })?;
        if !codes_match(code.trim(), &stored) {
            return Err(Error::InvalidInput("Invalid verification code".to_string()));
        }
        self.store.delete(&key).await?;

        if !self.users.mark_verified(email).await? {
            return Err(Error::NotFound("No account for this email".to_string()));
        }
        info!(subsystem = "auth", op = "verify_email", "Email verified");
        Ok(())
    }

    pub async fn verification_status(&self, email: &str) -> Result<bool> {
        self.users
            .find_by_email(email)
            .await?
            .map(|user| user.is_verified)
            .ok_or_else(|| Error::NotFound("Email is not registered".to_string()))
    }

    /// Standalone verification: create a placeholder account if needed and
    /// email a code.
    pub async fn request_verification(&self, email: &str) -> Result<()> {
        require_email(email).map_err(credential_error)?;
        let key = pending_user_key(email);
        if self.store.exists(&key).await? {
            return Err(Error::RateLimited(
                "Email verification already in progress, try again later".to_string(),
            ));
        }
        self.users.create_pending(email).await?;
        let value = serde_json::json!({ "email": email }).to_string();
        self.store
            .set_ex(&key, &value, secs(defaults::PENDING_USER_TTL_SECS))
            .await?;
        self.send_code(email).await
    }

    /// Check credentials and issue a stored token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());
        let user = self.users.find_by_email(email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            return Err(invalid());
        }
        if user.is_deleted() {
            return Err(Error::Forbidden("Account has been deleted".to_string()));
        }
        if !user.is_verified {
            return Err(Error::Forbidden("Email is not verified".to_string()));
        }

        let pair = self
            .tokens
            .issue_pair(user.user_id)
            .map_err(credential_error)?;
        self.store_token(user.user_id, TokenKind::Access, &pair.access_token)
            .await?;
        self.store_token(user.user_id, TokenKind::Refresh, &pair.refresh_token)
            .await?;
        info!(subsystem = "auth", op = "login", user_id = %user.user_id, "Login");
        Ok(pair)
    }

    /// Exchange the current refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(credential_error)?;
        let stored = self.store.get(&refresh_token_key(&claims.user_id)).await?;
        if stored.as_deref() != Some(refresh_token) {
            return Err(Error::Unauthorized(
                "Refresh token has been revoked, please log in again".to_string(),
            ));
        }

        let access = self
            .tokens
            .issue(claims.user_id, TokenKind::Access)
            .map_err(credential_error)?;
        self.store_token(claims.user_id, TokenKind::Access, &access)
            .await?;
        Ok(access)
    }

    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let claims = self
            .tokens
            .verify(access_token, TokenKind::Access)
            .map_err(credential_error)?;
        self.revoke_tokens(claims.user_id).await?;
        info!(subsystem = "auth", op = "logout", user_id = %claims.user_id, "Logout");
        Ok(())
    }

    /// Email a password-reset link. Throttled per address.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| Error::NotFound("No account uses this email".to_string()))?;
        let key = password_reset_key(email);
        if self.store.exists(&key).await? {
            return Err(Error::RateLimited(
                "Password reset requested too often, try again later".to_string(),
            ));
        }

        let token = self.tokens.issue_reset(&user.email).map_err(credential_error)?;
        let link = format!("{}/reset-password?token={}", self.base_url, token);
        self.mailer
            .send(&Email {
                to: user.email.clone(),
                subject: "비밀번호 재설정 요청".to_string(),
                text: format!("비밀번호를 재설정하려면 아래 링크를 클릭하세요:\n{link}"),
            })
            .await?;

        self.store
            .set_ex(&key, "requested", self.tokens.reset_ttl())
            .await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        email: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<()> {
        if [token, email, new_password, confirm]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(Error::InvalidInput("All fields are required".to_string()));
        }
        let token_email = self.tokens.verify_reset(token).map_err(|e| match e {
            CryptoError::TokenExpired => Error::InvalidInput("Reset token has expired".to_string()),
            _ => Error::InvalidInput("Invalid reset token".to_string()),
        })?;
        if token_email != email {
            return Err(Error::InvalidInput("Email does not match the reset token".to_string()));
        }
        validate_password(new_password).map_err(credential_error)?;
        if new_password != confirm {
            return Err(Error::InvalidInput("Passwords do not match".to_string()));
        }

        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        let hash = hash_blocking(new_password.to_string()).await?;
        self.users.update_password(email, &hash).await?;
        self.revoke_tokens(user.user_id).await?;
        info!(subsystem = "auth", op = "reset_password", user_id = %user.user_id, "Password reset");
        Ok(())
    }

    /// Withdraw an account and revoke its tokens.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<()> {
        if !self.users.soft_delete(user_id).await? {
            return Err(Error::NotFound(
                "Account not found or already deleted".to_string(),
            ));
        }
        self.revoke_tokens(user_id).await?;
        info!(subsystem = "auth", op = "delete_account", user_id = %user_id, "Account withdrawn");
        Ok(())
    }

    async fn store_token(&self, user_id: Uuid, kind: TokenKind, token: &str) -> Result<()> {
        let key = match kind {
            TokenKind::Access => access_token_key(&user_id),
            TokenKind::Refresh => refresh_token_key(&user_id),
        };
        self.store.set_ex(&key, token, self.tokens.ttl(kind)).await
    }

    async fn revoke_tokens(&self, user_id: Uuid) -> Result<()> {
        self.store.delete(&access_token_key(&user_id)).await?;
        self.store.delete(&refresh_token_key(&user_id)).await
    }
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            warn!(error = %e, "Password hashing task failed");
            Error::Internal(format!("Password hashing task failed: {e}"))
        })?
        .map_err(credential_error)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
