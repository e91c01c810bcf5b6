// src/services/oauth.rs
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::models::Provider;
use crate::common::config::ProviderCredentials;

const CLIENT_USER_AGENT: &str = "social-auth-api";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0} OAuth not configured")]
    NotConfigured(Provider),

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Endpoints and scopes for one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub profile_url: &'static str,
    pub scopes: &'static [&'static str],
}

impl ProviderEndpoints {
    pub fn for_provider(provider: Provider) -> Option<Self> {
        match provider {
            Provider::Google => Some(Self {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
                token_url: "https://oauth2.googleapis.com/token",
                profile_url: "https://openidconnect.googleapis.com/v1/userinfo",
                scopes: &["openid", "email", "profile"],
            }),
            Provider::GitHub => Some(Self {
                authorize_url: "https://github.com/login/oauth/authorize",
                token_url: "https://github.com/login/oauth/access_token",
                profile_url: "https://api.github.com/user",
                scopes: &["read:user", "user:email"],
            }),
            Provider::Discord => Some(Self {
                authorize_url: "https://discord.com/oauth2/authorize",
                token_url: "https://discord.com/api/oauth2/token",
                profile_url: "https://discord.com/api/users/@me",
                scopes: &["identify", "email"],
            }),
            Provider::Local => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderClient {
    credentials: ProviderCredentials,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

/// Authorization-code handshake against the configured providers.
pub struct OAuthService {
    client: Client,
    providers: HashMap<Provider, ProviderClient>,
}

impl OAuthService {
    pub fn new(client: Client, credentials: &HashMap<Provider, ProviderCredentials>) -> Self {
        let providers = credentials
            .iter()
            .filter_map(|(provider, creds)| {
                ProviderEndpoints::for_provider(*provider).map(|endpoints| {
                    (
                        *provider,
                        ProviderClient {
                            credentials: creds.clone(),
                            endpoints,
                        },
                    )
                })
            })
            .collect();

        Self { client, providers }
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    fn provider(&self, provider: Provider) -> Result<&ProviderClient, OAuthError> {
        self.providers
            .get(&provider)
            .ok_or(OAuthError::NotConfigured(provider))
    }

    /// Build the consent screen URL for `provider`.
    pub fn authorization_url(
        &self,
        provider: Provider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let client = self.provider(provider)?;
        let scope_param = client.endpoints.scopes.join(" ");

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            client.endpoints.authorize_url,
            urlencoding::encode(&client.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_param),
            urlencoding::encode(state),
        );

        debug!(provider = %provider, scopes = %scope_param, "Generated OAuth authorization URL");
        Ok(auth_url)
    }

    /// Exchange `code` for a provider token and return the raw profile JSON.
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Value, OAuthError> {
        let client = self.provider(provider)?;
        let access_token = self.exchange_code(provider, client, code, redirect_uri).await?;

        let mut profile = self
            .get_json(client.endpoints.profile_url, &access_token)
            .await?;

        if provider == Provider::GitHub {
            // Private addresses only show up on the emails endpoint.
            match self.get_json(GITHUB_EMAILS_URL, &access_token).await {
                Ok(emails @ Value::Array(_)) => {
                    if let Value::Object(map) = &mut profile {
                        map.insert("emails".to_string(), emails);
                    }
                }
                Ok(_) => warn!("GitHub emails endpoint returned unexpected payload"),
                Err(e) => warn!(error = %e, "Failed to fetch GitHub emails, continuing without"),
            }
        }

        Ok(profile)
    }

    async fn exchange_code(
        &self,
        provider: Provider,
        client: &ProviderClient,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let params = [
            ("code", code),
            ("client_id", client.credentials.client_id.as_str()),
            ("client_secret", client.credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %provider, "Exchanging authorization code for tokens");

        let response = self
            .client
            .post(client.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = %provider,
                status = %status,
                error = %error_text,
                "Token exchange failed"
            );
            return Err(OAuthError::OAuthFailed(format!("HTTP {}", status)));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::SerializationError(e.to_string()))?;

        // GitHub reports exchange errors with a 200 status.
        match (token_response.access_token, token_response.error) {
            (Some(token), None) => Ok(token),
            (_, error) => {
                let reason = error.unwrap_or_else(|| "missing access_token".to_string());
                error!(
                    provider = %provider,
                    error = %reason,
                    description = ?token_response.error_description,
                    "Token exchange rejected"
                );
                Err(OAuthError::OAuthFailed(reason))
            }
        }
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, OAuthError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %url, status = %status, "Provider profile request failed");
            return Err(OAuthError::OAuthFailed(format!("HTTP {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OAuthError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OAuthService {
        let mut credentials = HashMap::new();
        credentials.insert(
            Provider::Google,
            ProviderCredentials {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
            },
        );
        credentials.insert(
            Provider::Discord,
            ProviderCredentials {
                client_id: "discord id".to_string(),
                client_secret: "discord_secret".to_string(),
            },
        );
        OAuthService::new(Client::new(), &credentials)
    }

    #[test]
    fn test_get_authorization_url() {
        let auth_url = service()
            .authorization_url(
                Provider::Google,
                "state123",
                "http://localhost:5000/auth/google/callback",
            )
            .unwrap();

        assert!(auth_url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(auth_url.contains("client_id=test_client_id"));
        assert!(auth_url
            .contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fgoogle%2Fcallback"));
        assert!(auth_url.contains("scope=openid%20email%20profile"));
        assert!(auth_url.contains("state=state123"));
    }

    #[test]
    fn test_client_id_is_encoded() {
        let auth_url = service()
            .authorization_url(Provider::Discord, "s", "http://x/cb")
            .unwrap();
        assert!(auth_url.contains("client_id=discord%20id"));
        assert!(auth_url.contains("scope=identify%20email"));
    }

    #[test]
    fn test_unconfigured_provider() {
        let svc = service();
        assert!(svc.is_enabled(Provider::Google));
        assert!(!svc.is_enabled(Provider::GitHub));
        assert!(matches!(
            svc.authorization_url(Provider::GitHub, "s", "http://x/cb"),
            Err(OAuthError::NotConfigured(Provider::GitHub))
        ));
    }

    #[tokio::test]
    async fn test_fetch_profile_unconfigured_provider() {
        let result = service()
            .fetch_profile(Provider::GitHub, "code", "http://x/cb")
            .await;
        assert!(matches!(result, Err(OAuthError::NotConfigured(_))));
    }
}
