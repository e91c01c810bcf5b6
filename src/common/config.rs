// src/common/config.rs
//! Runtime configuration loaded from the process environment.
//!
//! `main` calls `dotenv().ok()` first, so a local `.env` file feeds the same
//! lookups. Tests go through [`AppConfig::from_lookup`] with a plain map.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::env;
use tracing::{info, warn};

use crate::auth::models::Provider;

const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
const DEV_ACCESS_SECRET: &str = "dev_access_secret_change_me";
const DEV_REFRESH_SECRET: &str = "dev_refresh_secret_change_me";

/// Deployment environment, decides whether cookies are relaxed for plain http.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "production" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// SES settings for the welcome mail. Any missing field disables sending.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub from_address: Option<String>,
    pub app_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    pub port: u16,
    pub client_url: String,
    pub server_url: String,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub providers: HashMap<Provider, ProviderCredentials>,
    pub email: EmailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get("APP_ENV").as_deref());

        let port = get("PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5000);

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://social_auth.db".to_string());

        let client_url = get("CLIENT_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string());

        let server_url = get("SERVER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let (jwt_access_secret, jwt_refresh_secret) = match (
            get("JWT_ACCESS_SECRET"),
            get("JWT_REFRESH_SECRET"),
        ) {
            (Some(access), Some(refresh)) => (access, refresh),
            _ if environment == Environment::Production => {
                bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be set in production");
            }
            (access, refresh) => {
                warn!("JWT signing secrets not fully configured, using development defaults");
                (
                    access.unwrap_or_else(|| DEV_ACCESS_SECRET.to_string()),
                    refresh.unwrap_or_else(|| DEV_REFRESH_SECRET.to_string()),
                )
            }
        };

        if jwt_access_secret == jwt_refresh_secret {
            bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }

        let mut providers = HashMap::new();
        for provider in Provider::federated() {
            let prefix = provider.as_str().to_uppercase();
            let client_id = get(&format!("{}_CLIENT_ID", prefix));
            let client_secret = get(&format!("{}_CLIENT_SECRET", prefix));

            match (client_id, client_secret) {
                (Some(client_id), Some(client_secret)) => {
                    info!(provider = %provider, "OAuth provider enabled");
                    providers.insert(
                        provider,
                        ProviderCredentials {
                            client_id,
                            client_secret,
                        },
                    );
                }
                (Some(_), None) => {
                    warn!(
                        provider = %provider,
                        "OAuth client id set without a secret, provider disabled"
                    );
                }
                _ => {}
            }
        }

        let email = EmailConfig {
            access_key_id: get("AWS_ACCESS_KEY_ID"),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            region: get("AWS_SES_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            from_address: get("EMAIL_FROM"),
            app_name: get("APP_NAME").unwrap_or_else(|| "ProjectUI".to_string()),
        };

        Ok(Self {
            environment,
            database_url,
            port,
            client_url,
            server_url,
            jwt_access_secret,
            jwt_refresh_secret,
            providers,
            email,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn callback_url(&self, provider: Provider) -> String {
        format!("{}/auth/{}/callback", self.server_url, provider)
    }

    pub fn login_success_url(&self) -> String {
        format!("{}?login=success", self.client_url)
    }

    pub fn login_failure_url(&self, code: &str) -> String {
        format!(
            "{}/auth/login?error={}",
            self.client_url,
            urlencoding::encode(code)
        )
    }

    /// Origins allowed to make credentialed cross-site requests.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![DEFAULT_CLIENT_URL.to_string()];
        if !origins.contains(&self.client_url) {
            origins.push(self.client_url.clone());
        }
        origins
    }
}
