//! Double-submit CSRF protection.
//!
//! The token is random and bound to nothing. A request passes only when the
//! `csrfToken` cookie and the `x-csrf-token` header are both present and
//! byte-for-byte equal, which proves same-origin script read the cookie.

use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::cookies::CSRF_TOKEN_COOKIE;
use crate::common::ApiError;

pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_TOKEN_BYTES: usize = 32;

/// Generate a fresh 256-bit token, hex encoded.
pub fn issue() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn verify(cookie_value: Option<&str>, header_value: Option<&str>) -> bool {
    match (cookie_value, header_value) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && !header.is_empty() => {
            cookie.as_bytes().ct_eq(header.as_bytes()).into()
        }
        _ => false,
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok())
}

/// Middleware rejecting mutating requests without a matching token pair.
pub async fn require_csrf(request: Request, next: Next) -> Result<Response, ApiError> {
    if is_mutating(request.method()) {
        let jar = CookieJar::from_headers(request.headers());
        let cookie_token = jar.get(CSRF_TOKEN_COOKIE);
        let cookie_value = cookie_token.as_ref().map(|c| c.value());

        if !verify(cookie_value, header_token(request.headers())) {
            warn!(
                method = %request.method(),
                uri = %request.uri(),
                "CSRF check failed"
            );
            return Err(ApiError::CsrfMismatch);
        }
    }

    Ok(next.run(request).await)
}
