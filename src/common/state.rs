// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::cookies::SessionCookies;
use crate::auth::linker::AccountLinker;
use crate::auth::store::UserStore;
use crate::auth::tokens::TokenService;
use crate::common::config::AppConfig;
use crate::services::{Notifier, OAuthService};

/// Application state containing services and configuration
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub cookies: SessionCookies,
    pub oauth: Arc<OAuthService>,
    pub users: UserStore,
    pub linker: AccountLinker,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        http: Client,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            &config.jwt_access_secret,
            &config.jwt_refresh_secret,
        ));
        let cookies = SessionCookies::new(config.environment);
        let oauth = Arc::new(OAuthService::new(http, &config.providers));
        let users = UserStore::new(db);
        let linker = AccountLinker::new(users.clone(), notifier);

        Self {
            config: Arc::new(config),
            tokens,
            cookies,
            oauth,
            users,
            linker,
        }
    }
}
