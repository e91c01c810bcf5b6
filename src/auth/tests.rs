//! Tests for auth module
//!
//! These tests drive the auth router end to end:
//! - CSRF token issue and the logout guard
//! - Cookie sessions on /auth/me
//! - Refresh token acceptance and rejection
//! - OAuth start and callback failure redirects
//! - Federated sign-in

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::cookies::{
        ACCESS_TOKEN_COOKIE, CSRF_TOKEN_COOKIE, OAUTH_STATE_COOKIE, REFRESH_TOKEN_COOKIE,
    };
    use crate::auth::csrf::CSRF_HEADER;
    use crate::auth::models::{FederatedIdentity, Provider};
    use crate::auth::store::InsertOutcome;
    use crate::auth::tokens::{KeyClass, REFRESH_TOKEN_TTL_DAYS};
    use crate::common::migrations::run_migrations;
    use crate::common::{AppConfig, AppState};
    use crate::services::email::testing::RecordingNotifier;
    use axum::{
        body::{to_bytes, Body},
        extract::Extension,
        http::{header, Request, StatusCode},
        response::{IntoResponse, Response},
        Router,
    };
    use axum_extra::extract::cookie::{Cookie, CookieJar};
    use chrono::Utc;
    use cookie::time::Duration as CookieDuration;
    use reqwest::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tower::ServiceExt;

    const CLIENT_URL: &str = "http://localhost:5173";

    struct Harness {
        state: Arc<AppState>,
        app: Router,
        notifications: UnboundedReceiver<String>,
    }

    async fn setup() -> Harness {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let env: HashMap<&str, &str> = [
            ("CLIENT_URL", CLIENT_URL),
            ("SERVER_URL", "http://localhost:5000"),
            ("JWT_ACCESS_SECRET", "access_secret_for_tests"),
            ("JWT_REFRESH_SECRET", "refresh_secret_for_tests"),
            ("GOOGLE_CLIENT_ID", "google_client"),
            ("GOOGLE_CLIENT_SECRET", "google_secret"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        let (notifier, notifications) = RecordingNotifier::new();
        let state = Arc::new(AppState::new(pool, config, Client::new(), Arc::new(notifier)));
        let app = auth_routes().layer(Extension(state.clone()));

        Harness {
            state,
            app,
            notifications,
        }
    }

    fn identity(provider: Provider, provider_id: &str, email: &str) -> FederatedIdentity {
        FederatedIdentity {
            provider,
            provider_id: provider_id.to_string(),
            email: email.to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        }
    }

    async fn create_user(harness: &Harness, email: &str) -> String {
        match harness
            .state
            .users
            .insert(&identity(Provider::Google, "g1", email))
            .await
            .unwrap()
        {
            InsertOutcome::Created(user) => user.id,
            InsertOutcome::EmailTaken => panic!("email already taken"),
        }
    }

    fn request(method: &str, uri: &str, cookies: &BTreeMap<String, String>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if !cookies.is_empty() {
            let header_value = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, header_value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(harness: &Harness, request: Request<Body>) -> Response {
        harness.app.clone().oneshot(request).await.unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
            .collect()
    }

    fn find_cookie(response: &Response, name: &str) -> Option<Cookie<'static>> {
        set_cookies(response).into_iter().find(|c| c.name() == name)
    }

    /// Apply Set-Cookie headers the way a browser would.
    fn apply_set_cookies(cookies: &mut BTreeMap<String, String>, response: &Response) {
        for cookie in set_cookies(response) {
            if cookie.max_age() == Some(CookieDuration::ZERO) {
                cookies.remove(cookie.name());
            } else {
                cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn cookie_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_csrf_token_endpoint_sets_readable_cookie() {
        let harness = setup().await;

        let response = send(&harness, request("GET", "/auth/csrf-token", &BTreeMap::new())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = find_cookie(&response, CSRF_TOKEN_COOKIE).expect("csrf cookie");
        assert_ne!(cookie.http_only(), Some(true));

        let body = json_body(response).await;
        let token = body["csrfToken"].as_str().unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(cookie.value(), token);
    }

    #[tokio::test]
    async fn test_logout_requires_csrf_header() {
        let harness = setup().await;
        let user_id = create_user(&harness, "a@x.com").await;
        let access = harness.state.tokens.issue_access(&user_id).unwrap();
        let cookies = cookie_map(&[
            (ACCESS_TOKEN_COOKIE, access.as_str()),
            (CSRF_TOKEN_COOKIE, "abc123"),
        ]);

        let response = send(&harness, request("POST", "/auth/logout", &cookies)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(set_cookies(&response).is_empty());

        let mut mismatched = request("POST", "/auth/logout", &cookies);
        mismatched
            .headers_mut()
            .insert(CSRF_HEADER, "zzz999".parse().unwrap());
        let response = send(&harness, mismatched).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid or missing CSRF token");
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_ends_access() {
        let harness = setup().await;
        let user_id = create_user(&harness, "a@x.com").await;
        let access = harness.state.tokens.issue_access(&user_id).unwrap();
        let refresh = harness.state.tokens.issue_refresh(&user_id).unwrap();

        let mut cookies = BTreeMap::new();
        let response = send(&harness, request("GET", "/auth/csrf-token", &cookies)).await;
        apply_set_cookies(&mut cookies, &response);
        let csrf_token = cookies[CSRF_TOKEN_COOKIE].clone();
        cookies.insert(ACCESS_TOKEN_COOKIE.to_string(), access);
        cookies.insert(REFRESH_TOKEN_COOKIE.to_string(), refresh);

        let response = send(&harness, request("GET", "/auth/me", &cookies)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut logout = request("POST", "/auth/logout", &cookies);
        logout
            .headers_mut()
            .insert(CSRF_HEADER, csrf_token.parse().unwrap());
        let response = send(&harness, logout).await;
        assert_eq!(response.status(), StatusCode::OK);

        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, CSRF_TOKEN_COOKIE] {
            let cleared = find_cookie(&response, name).expect("cleared cookie");
            assert_eq!(cleared.value(), "");
            assert_eq!(cleared.max_age(), Some(CookieDuration::ZERO));
            assert_eq!(cleared.path(), Some("/"));
        }
        apply_set_cookies(&mut cookies, &response);
        assert_eq!(
            json_body(response).await["message"],
            "Logged out successfully"
        );

        assert!(cookies.is_empty());
        let response = send(&harness, request("GET", "/auth/me", &cookies)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_returns_user() {
        let harness = setup().await;
        let user_id = create_user(&harness, "me@x.com").await;
        let access = harness.state.tokens.issue_access(&user_id).unwrap();

        let response = send(
            &harness,
            request("GET", "/auth/me", &cookie_map(&[(ACCESS_TOKEN_COOKIE, access.as_str())])),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["id"], user_id.as_str());
        assert_eq!(body["user"]["email"], "me@x.com");
        assert_eq!(body["user"]["provider"], "google");
        assert_eq!(body["user"]["providerId"], "g1");
    }

    #[tokio::test]
    async fn test_me_rejects_missing_forged_and_orphaned_tokens() {
        let harness = setup().await;

        let response = send(&harness, request("GET", "/auth/me", &BTreeMap::new())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let user_id = create_user(&harness, "a@x.com").await;
        let refresh = harness.state.tokens.issue_refresh(&user_id).unwrap();
        let response = send(
            &harness,
            request("GET", "/auth/me", &cookie_map(&[(ACCESS_TOKEN_COOKIE, refresh.as_str())])),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let orphan = harness.state.tokens.issue_access("U_GONE").unwrap();
        let response = send(
            &harness,
            request("GET", "/auth/me", &cookie_map(&[(ACCESS_TOKEN_COOKIE, orphan.as_str())])),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Not authorized");
    }

    #[tokio::test]
    async fn test_refresh_issues_new_access_cookie() {
        let harness = setup().await;
        let user_id = create_user(&harness, "a@x.com").await;
        let refresh = harness.state.tokens.issue_refresh(&user_id).unwrap();

        let mut cookies = cookie_map(&[(REFRESH_TOKEN_COOKIE, refresh.as_str())]);
        let response = send(&harness, request("POST", "/auth/refresh", &cookies)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let access = find_cookie(&response, ACCESS_TOKEN_COOKIE).expect("access cookie");
        assert_eq!(access.max_age(), Some(CookieDuration::seconds(900)));
        assert_eq!(access.http_only(), Some(true));
        assert!(find_cookie(&response, REFRESH_TOKEN_COOKIE).is_none());

        apply_set_cookies(&mut cookies, &response);
        assert_eq!(json_body(response).await["success"], true);

        let response = send(&harness, request("GET", "/auth/me", &cookies)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_token() {
        let harness = setup().await;
        let issued_at = Utc::now()
            - chrono::Duration::days(REFRESH_TOKEN_TTL_DAYS)
            - chrono::Duration::seconds(1);
        let expired = harness
            .state
            .tokens
            .issue_at(KeyClass::Refresh, "U_ABC", issued_at)
            .unwrap();

        let response = send(
            &harness,
            request(
                "POST",
                "/auth/refresh",
                &cookie_map(&[(REFRESH_TOKEN_COOKIE, expired.as_str())]),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(json_body(response).await["error"], "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_refresh_rejects_tampered_and_access_tokens() {
        let harness = setup().await;
        let refresh = harness.state.tokens.issue_refresh("U_ABC").unwrap();
        let mut tampered = refresh.clone();
        tampered.push('x');

        let response = send(
            &harness,
            request(
                "POST",
                "/auth/refresh",
                &cookie_map(&[(REFRESH_TOKEN_COOKIE, tampered.as_str())]),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(set_cookies(&response).is_empty());

        let access = harness.state.tokens.issue_access("U_ABC").unwrap();
        let response = send(
            &harness,
            request(
                "POST",
                "/auth/refresh",
                &cookie_map(&[(REFRESH_TOKEN_COOKIE, access.as_str())]),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_unauthorized() {
        let harness = setup().await;
        let response = send(&harness, request("POST", "/auth/refresh", &BTreeMap::new())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_oauth_start_redirects_to_google() {
        let harness = setup().await;
        let response = send(&harness, request("GET", "/auth/google", &BTreeMap::new())).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let target = location(&response);
        assert!(target.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(target.contains("client_id=google_client"));
        assert!(target.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fgoogle%2Fcallback"
        ));

        let state_cookie = find_cookie(&response, OAUTH_STATE_COOKIE).expect("state cookie");
        assert_eq!(state_cookie.http_only(), Some(true));
        assert_eq!(state_cookie.max_age(), Some(CookieDuration::minutes(10)));
        assert!(target.contains(&format!("state={}", state_cookie.value())));
    }

    #[tokio::test]
    async fn test_oauth_start_unavailable_provider() {
        let harness = setup().await;
        let expected = format!("{}/auth/login?error=provider_unavailable", CLIENT_URL);

        for path in ["/auth/twitter", "/auth/github", "/auth/local"] {
            let response = send(&harness, request("GET", path, &BTreeMap::new())).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(location(&response), expected, "{}", path);
            assert!(find_cookie(&response, OAUTH_STATE_COOKIE).is_none());
        }
    }

    #[tokio::test]
    async fn test_callback_provider_error_redirects_denied() {
        let harness = setup().await;
        let cookies = cookie_map(&[(OAUTH_STATE_COOKIE, "s1")]);

        let response = send(
            &harness,
            request("GET", "/auth/google/callback?error=access_denied&state=s1", &cookies),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            format!("{}/auth/login?error=provider_denied", CLIENT_URL)
        );

        let cleared = find_cookie(&response, OAUTH_STATE_COOKIE).expect("state cleared");
        assert_eq!(cleared.max_age(), Some(CookieDuration::ZERO));
        assert!(find_cookie(&response, ACCESS_TOKEN_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_redirects_invalid_state() {
        let harness = setup().await;
        let expected = format!("{}/auth/login?error=invalid_state", CLIENT_URL);

        let response = send(
            &harness,
            request(
                "GET",
                "/auth/google/callback?code=abc&state=forged",
                &cookie_map(&[(OAUTH_STATE_COOKIE, "s1")]),
            ),
        )
        .await;
        assert_eq!(location(&response), expected);

        let response = send(
            &harness,
            request("GET", "/auth/google/callback?code=abc&state=s1", &BTreeMap::new()),
        )
        .await;
        assert_eq!(location(&response), expected);
        assert!(find_cookie(&response, ACCESS_TOKEN_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_sign_in_creates_user_and_sets_session() {
        let mut harness = setup().await;
        let state = harness.state.clone();

        let (jar, redirect) = handlers::sign_in(
            &state,
            CookieJar::new(),
            &identity(Provider::Google, "g1", "a@x.com"),
        )
        .await
        .unwrap();

        let response = redirect.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("{}?login=success", CLIENT_URL));

        let access = jar.get(ACCESS_TOKEN_COOKIE).expect("access cookie");
        let refresh = jar.get(REFRESH_TOKEN_COOKIE).expect("refresh cookie");
        let subject = state
            .tokens
            .verify(access.value(), KeyClass::Access)
            .unwrap()
            .subject;
        assert_eq!(
            state.tokens.verify(refresh.value(), KeyClass::Refresh).unwrap().subject,
            subject
        );

        let user = state.users.find_by_id(&subject).await.unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.provider, "google");

        let sent = tokio::time::timeout(Duration::from_secs(1), harness.notifications.recv())
            .await
            .expect("welcome not dispatched");
        assert_eq!(sent.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_sign_in_with_second_provider_keeps_user() {
        let mut harness = setup().await;
        let state = harness.state.clone();

        let (first_jar, _) = handlers::sign_in(
            &state,
            CookieJar::new(),
            &identity(Provider::Google, "g1", "a@x.com"),
        )
        .await
        .unwrap();
        let (second_jar, _) = handlers::sign_in(
            &state,
            CookieJar::new(),
            &identity(Provider::GitHub, "gh1", "a@x.com"),
        )
        .await
        .unwrap();

        let subject = |jar: &CookieJar| {
            state
                .tokens
                .verify(jar.get(ACCESS_TOKEN_COOKIE).unwrap().value(), KeyClass::Access)
                .unwrap()
                .subject
        };
        let user_id = subject(&first_jar);
        assert_eq!(subject(&second_jar), user_id);

        let user = state.users.find_by_id(&user_id).await.unwrap().unwrap();
        assert_eq!(user.provider, "google");
        assert_eq!(user.provider_id.as_deref(), Some("g1"));

        harness.notifications.recv().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.notifications.try_recv().is_err());
    }

    #[test]
    fn test_login_failure_codes() {
        use handlers::LoginFailure;
        assert_eq!(LoginFailure::ProviderDenied.code(), "provider_denied");
        assert_eq!(LoginFailure::InvalidState.code(), "invalid_state");
        assert_eq!(LoginFailure::MalformedProfile.code(), "malformed_profile");
    }
}
