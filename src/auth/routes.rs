//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::csrf::require_csrf;
use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/:provider` - Start federated login
/// - `GET /auth/:provider/callback` - Provider redirect target
/// - `GET /auth/me` - Current user
/// - `POST /auth/refresh` - Mint a new access token from the refresh cookie
/// - `POST /auth/logout` - Clear session cookies. Requires the `x-csrf-token`
///   header to equal the `csrfToken` cookie, otherwise 403; fetch
///   `GET /auth/csrf-token` first.
/// - `GET /auth/csrf-token` - Issue a CSRF token
pub fn auth_routes() -> Router {
    let guarded = Router::new()
        .route("/auth/logout", post(handlers::logout_handler))
        .route_layer(middleware::from_fn(require_csrf));

    Router::new()
        .route("/auth/me", get(handlers::me_handler))
        .route("/auth/refresh", post(handlers::refresh_handler))
        .route("/auth/csrf-token", get(handlers::csrf_token_handler))
        .route("/auth/:provider", get(handlers::oauth_start))
        .route("/auth/:provider/callback", get(handlers::oauth_callback))
        .merge(guarded)
}
