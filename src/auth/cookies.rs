//! Session cookie handling.
//!
//! Browsers only delete a cookie when the clearing `Set-Cookie` carries the
//! same name, path, `Secure`, `SameSite` and `Partitioned` attributes it was
//! set with. Every cookie here is built by one function per kind, and the
//! clearing variant reuses it with an empty value and `Max-Age=0`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::{Duration, OffsetDateTime};

use super::tokens::{ACCESS_TOKEN_TTL_MINUTES, REFRESH_TOKEN_TTL_DAYS};
use crate::common::config::Environment;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const CSRF_TOKEN_COOKIE: &str = "csrfToken";
pub const OAUTH_STATE_COOKIE: &str = "oauthState";

const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Cookie security attributes shared by every cookie the service sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
    pub partitioned: bool,
}

impl CookiePolicy {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self {
                secure: true,
                same_site: SameSite::None,
                partitioned: true,
            },
            Environment::Development => Self {
                secure: false,
                same_site: SameSite::Lax,
                partitioned: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    policy: CookiePolicy,
}

impl SessionCookies {
    pub fn new(environment: Environment) -> Self {
        Self {
            policy: CookiePolicy::for_environment(environment),
        }
    }

    fn build(&self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        let mut cookie = Cookie::new(name, value);
        cookie.set_http_only(http_only);
        cookie.set_secure(self.policy.secure);
        cookie.set_same_site(self.policy.same_site);
        cookie.set_partitioned(self.policy.partitioned);
        cookie.set_path("/");
        cookie
    }

    fn removal(&self, name: &'static str, http_only: bool) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new(), http_only);
        cookie.set_max_age(Duration::ZERO);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        let mut cookie = self.build(ACCESS_TOKEN_COOKIE, token.to_string(), true);
        cookie.set_max_age(Duration::minutes(ACCESS_TOKEN_TTL_MINUTES));
        cookie
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        let mut cookie = self.build(REFRESH_TOKEN_COOKIE, token.to_string(), true);
        cookie.set_max_age(Duration::days(REFRESH_TOKEN_TTL_DAYS));
        cookie
    }

    /// Readable by client script so it can echo the value in a header.
    pub fn csrf_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(CSRF_TOKEN_COOKIE, token.to_string(), false)
    }

    pub fn oauth_state_cookie(&self, state: &str) -> Cookie<'static> {
        let mut cookie = self.build(OAUTH_STATE_COOKIE, state.to_string(), true);
        cookie.set_max_age(Duration::minutes(OAUTH_STATE_TTL_MINUTES));
        cookie
    }

    pub fn set_session(
        &self,
        jar: CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> CookieJar {
        jar.add(self.access_cookie(access_token))
            .add(self.refresh_cookie(refresh_token))
    }

    pub fn set_access(&self, jar: CookieJar, access_token: &str) -> CookieJar {
        jar.add(self.access_cookie(access_token))
    }

    pub fn clear_session(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.removal(ACCESS_TOKEN_COOKIE, true))
            .add(self.removal(REFRESH_TOKEN_COOKIE, true))
    }

    pub fn set_csrf(&self, jar: CookieJar, token: &str) -> CookieJar {
        jar.add(self.csrf_cookie(token))
    }

    pub fn clear_csrf(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.removal(CSRF_TOKEN_COOKIE, false))
    }

    pub fn set_oauth_state(&self, jar: CookieJar, state: &str) -> CookieJar {
        jar.add(self.oauth_state_cookie(state))
    }

    pub fn clear_oauth_state(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.removal(OAUTH_STATE_COOKIE, true))
    }
}
