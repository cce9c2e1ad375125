//! Request authentication.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use tracing::debug;
use uuid::Uuid;

use counsel_core::logging;
use counsel_crypto::TokenKind;

use crate::services::ephemeral::access_token_key;
use crate::{ApiError, AppState};

/// The authenticated caller.
///
/// Accepts `Authorization: Bearer <jwt>` or the bare token. The token must
/// verify as an access token and still be the one stored for its user, so
/// tokens revoked by logout or a password reset are refused.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Token carried by the request, if any.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    if value.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("login required".to_string()))?;

        let claims = state.tokens.verify(token, TokenKind::Access)?;

        let stored = state.store.get(&access_token_key(&claims.user_id)).await?;
        if stored.as_deref() != Some(token) {
            debug!(user_id = %claims.user_id, "Rejected revoked access token");
            return Err(ApiError::Unauthorized(
                "Session has ended, please log in again".to_string(),
            ));
        }

        tracing::Span::current().record(
            logging::USER_ID,
            tracing::field::display(claims.user_id),
        );
        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_forms() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("  Bearer   abc  "))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
