//! Authentication handlers

use axum::{
    extract::{Extension, Json, Path, Query},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::cookies::{OAUTH_STATE_COOKIE, REFRESH_TOKEN_COOKIE};
use super::csrf;
use super::extractors::AuthedUser;
use super::federation;
use super::models::{FederatedIdentity, Provider};
use super::tokens::KeyClass;
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState};

/// Reasons a browser login ends on the client's login page. Only the code
/// reaches the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    ProviderUnavailable,
    ProviderDenied,
    InvalidState,
    ProviderError,
    MalformedProfile,
    ServerError,
}

impl LoginFailure {
    pub fn code(&self) -> &'static str {
        match self {
            LoginFailure::ProviderUnavailable => "provider_unavailable",
            LoginFailure::ProviderDenied => "provider_denied",
            LoginFailure::InvalidState => "invalid_state",
            LoginFailure::ProviderError => "provider_error",
            LoginFailure::MalformedProfile => "malformed_profile",
            LoginFailure::ServerError => "server_error",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn federated_provider(raw: &str) -> Option<Provider> {
    raw.parse::<Provider>()
        .ok()
        .filter(|p| *p != Provider::Local)
}

fn failure_redirect(state: &AppState, failure: LoginFailure) -> Redirect {
    Redirect::to(&state.config.login_failure_url(failure.code()))
}

/// GET /auth/{provider}
/// Starts federated login by redirecting to the provider's consent screen
pub async fn oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let Some(provider) = federated_provider(&provider).filter(|p| state.oauth.is_enabled(*p)) else {
        warn!(provider = %provider, "Login requested for unavailable provider");
        return (jar, failure_redirect(&state, LoginFailure::ProviderUnavailable));
    };

    let oauth_state = csrf::issue();
    let redirect_uri = state.config.callback_url(provider);

    match state.oauth.authorization_url(provider, &oauth_state, &redirect_uri) {
        Ok(auth_url) => {
            info!(provider = %provider, "Redirecting to OAuth consent screen");
            let jar = state.cookies.set_oauth_state(jar, &oauth_state);
            (jar, Redirect::to(&auth_url))
        }
        Err(e) => {
            error!(error = %e, provider = %provider, "Failed to build OAuth URL");
            (jar, failure_redirect(&state, LoginFailure::ServerError))
        }
    }
}

/// GET /auth/{provider}/callback
/// Completes federated login. Always answers with a redirect: session
/// cookies and `?login=success` on success, the login page with an error
/// code otherwise.
pub async fn oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = state.cookies.clear_oauth_state(jar);

    let resolved = resolve_identity(&state, &provider, &query, expected_state.as_deref()).await;
    let identity = match resolved {
        Ok(identity) => identity,
        Err(failure) => {
            warn!(provider = %provider, reason = failure.code(), "Federated login failed");
            return (jar, failure_redirect(&state, failure));
        }
    };

    match sign_in(&state, jar.clone(), &identity).await {
        Ok(result) => result,
        Err(failure) => (jar, failure_redirect(&state, failure)),
    }
}

async fn resolve_identity(
    state: &AppState,
    provider: &str,
    query: &CallbackQuery,
    expected_state: Option<&str>,
) -> Result<FederatedIdentity, LoginFailure> {
    let provider = federated_provider(provider)
        .filter(|p| state.oauth.is_enabled(*p))
        .ok_or(LoginFailure::ProviderUnavailable)?;

    if let Some(error) = &query.error {
        warn!(provider = %provider, oauth_error = %error, "Provider returned error");
        return Err(LoginFailure::ProviderDenied);
    }

    match (query.state.as_deref(), expected_state) {
        (Some(received), Some(expected)) if csrf::verify(Some(expected), Some(received)) => {}
        _ => return Err(LoginFailure::InvalidState),
    }

    let code = query.code.as_deref().ok_or(LoginFailure::ProviderError)?;
    let redirect_uri = state.config.callback_url(provider);

    let raw = state
        .oauth
        .fetch_profile(provider, code, &redirect_uri)
        .await
        .map_err(|e| {
            error!(error = %e, provider = %provider, "OAuth exchange failed");
            LoginFailure::ProviderError
        })?;

    federation::normalize(provider, raw).map_err(|e| {
        warn!(error = %e, "Provider profile could not be normalized");
        LoginFailure::MalformedProfile
    })
}

/// Link the identity to a user and start a session for it.
pub async fn sign_in(
    state: &AppState,
    jar: CookieJar,
    identity: &FederatedIdentity,
) -> Result<(CookieJar, Redirect), LoginFailure> {
    let (user, is_new) = state.linker.link_or_create(identity).await.map_err(|e| {
        error!(
            error = %e,
            email = %safe_email_log(&identity.email),
            provider = %identity.provider,
            "Database error during account linking"
        );
        LoginFailure::ServerError
    })?;

    let issued = state
        .tokens
        .issue_access(&user.id)
        .and_then(|access| Ok((access, state.tokens.issue_refresh(&user.id)?)));
    let (access_token, refresh_token) = issued.map_err(|e| {
        error!(error = %e, user_id = %user.id, "Token signing failed during login");
        LoginFailure::ServerError
    })?;

    info!(
        user_id = %user.id,
        provider = %identity.provider,
        new_user = is_new,
        "User logged in via federated login"
    );

    let jar = state.cookies.set_session(jar, &access_token, &refresh_token);
    Ok((jar, Redirect::to(&state.config.login_success_url())))
}

/// GET /auth/me
/// Returns the current authenticated user
///
/// # Response
/// ```json
/// { "success": true, "user": { ... } }
/// ```
pub async fn me_handler(authed: AuthedUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "user": authed.user,
    }))
}

/// POST /auth/refresh
/// Mints a new access token from the refresh cookie. The refresh token
/// itself is left untouched.
pub async fn refresh_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let token = match jar.get(REFRESH_TOKEN_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
        _ => return Err(ApiError::AuthenticationMissing),
    };

    let verified = state
        .tokens
        .verify(&token, KeyClass::Refresh)
        .map_err(|e| {
            warn!(error = %e, token = %safe_token_log(&token), "Refresh token verification failed");
            ApiError::TokenInvalid(KeyClass::Refresh)
        })?;

    let access_token = state
        .tokens
        .issue_access(&verified.subject)
        .map_err(|e| ApiError::InternalServer(e.to_string()))?;

    info!(user_id = %verified.subject, "Access token refreshed");

    let jar = state.cookies.set_access(jar, &access_token);
    Ok((jar, Json(serde_json::json!({ "success": true }))))
}

/// POST /auth/logout
/// Clears the session and CSRF cookies
///
/// Runs behind `require_csrf`: without a `csrfToken` cookie and a matching
/// `x-csrf-token` header the request gets 403 and no cookie is cleared.
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let jar = state.cookies.clear_session(jar);
    let jar = state.cookies.clear_csrf(jar);

    info!("User logout successful");
    (
        jar,
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

/// GET /auth/csrf-token
/// Issues a new CSRF token and sets the paired cookie
///
/// # Response
/// ```json
/// { "csrfToken": "<hex>" }
/// ```
pub async fn csrf_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let token = csrf::issue();
    let jar = state.cookies.set_csrf(jar, &token);
    (jar, Json(serde_json::json!({ "csrfToken": token })))
}
