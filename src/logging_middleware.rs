// src/logging_middleware.rs
//! Middleware for logging requests in debug mode
//!
//! Session cookies and the CSRF header carry credentials, so only their
//! presence is logged. Bodies are not read.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;
use std::time::Instant;
use tracing::debug;

use crate::auth::cookies::{ACCESS_TOKEN_COOKIE, CSRF_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::csrf::CSRF_HEADER;

#[derive(Debug, PartialEq, Eq)]
struct CredentialPresence {
    access: bool,
    refresh: bool,
    csrf_cookie: bool,
    csrf_header: bool,
}

fn credential_presence(headers: &HeaderMap) -> CredentialPresence {
    let jar = CookieJar::from_headers(headers);
    CredentialPresence {
        access: jar.get(ACCESS_TOKEN_COOKIE).is_some(),
        refresh: jar.get(REFRESH_TOKEN_COOKIE).is_some(),
        csrf_cookie: jar.get(CSRF_TOKEN_COOKIE).is_some(),
        csrf_header: headers.contains_key(CSRF_HEADER),
    }
}

/// Middleware to log method, path, status and latency
pub async fn log_request_response(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let presence = credential_presence(request.headers());

    debug!(
        method = %method,
        path = %path,
        access_cookie = presence.access,
        refresh_cookie = presence.refresh,
        csrf_cookie = presence.csrf_cookie,
        csrf_header = presence.csrf_header,
        "📥 Request"
    );

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    debug!(
        method = %method,
        path = %path,
        status = %response.status(),
        elapsed_ms,
        "📤 Response"
    );

    response
}
