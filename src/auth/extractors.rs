//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cookies::ACCESS_TOKEN_COOKIE;
use super::models::User;
use super::tokens::KeyClass;
use crate::common::{safe_token_log, ApiError, AppState};

/// Authenticated principal
///
/// Reads the access token cookie, verifies it and loads the user it names.
/// Every failure maps to the same 401 so clients cannot tell a missing
/// user from an expired or forged token.
#[derive(Debug)]
pub struct AuthedUser {
    pub user: User,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let jar = CookieJar::from_headers(&parts.headers);
        let token = match jar.get(ACCESS_TOKEN_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
            _ => {
                debug!("Authentication failed: no access token cookie");
                return Err(ApiError::AuthenticationMissing);
            }
        };

        let verified = app_state
            .tokens
            .verify(&token, KeyClass::Access)
            .map_err(|e| {
                warn!(
                    error = %e,
                    token = %safe_token_log(&token),
                    "Access token verification failed"
                );
                ApiError::TokenInvalid(KeyClass::Access)
            })?;

        match app_state.users.find_by_id(&verified.subject).await? {
            Some(user) => {
                debug!(user_id = %user.id, "User authentication successful via extractor");
                Ok(AuthedUser { user })
            }
            None => {
                warn!(
                    user_id = %verified.subject,
                    "Authentication failed: user not found in database"
                );
                Err(ApiError::TokenInvalid(KeyClass::Access))
            }
        }
    }
}
