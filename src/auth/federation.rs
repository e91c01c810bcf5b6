//! Provider profile normalization.
//!
//! Each provider returns its own profile JSON. [`normalize`] parses it into
//! the matching [`ProviderProfile`] variant and reduces that to a
//! [`FederatedIdentity`]. No I/O happens here.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::models::{FederatedIdentity, Provider};

const DISCORD_CDN: &str = "https://cdn.discordapp.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FederationError {
    #[error("malformed {provider} profile: {reason}")]
    MalformedProfile { provider: Provider, reason: String },
}

impl FederationError {
    fn malformed(provider: Provider, reason: impl Into<String>) -> Self {
        FederationError::MalformedProfile {
            provider,
            reason: reason.into(),
        }
    }
}

/// Google OpenID Connect userinfo.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// GitHub `/user`, with `/user/emails` merged in as `emails`.
#[derive(Debug, Deserialize)]
pub struct GitHubProfile {
    pub id: Value,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub emails: Vec<GitHubEmail>,
}

/// Discord `/users/@me`. `avatar` is an asset hash, not a URL.
#[derive(Debug, Deserialize)]
pub struct DiscordProfile {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub verified: Option<bool>,
}

#[derive(Debug)]
pub enum ProviderProfile {
    Google(GoogleProfile),
    GitHub(GitHubProfile),
    Discord(DiscordProfile),
}

impl ProviderProfile {
    pub fn parse(provider: Provider, raw: Value) -> Result<Self, FederationError> {
        let malformed = |e: serde_json::Error| FederationError::malformed(provider, e.to_string());

        match provider {
            Provider::Google => serde_json::from_value(raw)
                .map(ProviderProfile::Google)
                .map_err(malformed),
            Provider::GitHub => serde_json::from_value(raw)
                .map(ProviderProfile::GitHub)
                .map_err(malformed),
            Provider::Discord => serde_json::from_value(raw)
                .map(ProviderProfile::Discord)
                .map_err(malformed),
            Provider::Local => Err(FederationError::malformed(
                provider,
                "not a federated provider",
            )),
        }
    }

    pub fn into_identity(self) -> Result<FederatedIdentity, FederationError> {
        match self {
            ProviderProfile::Google(p) => google_identity(p),
            ProviderProfile::GitHub(p) => github_identity(p),
            ProviderProfile::Discord(p) => discord_identity(p),
        }
    }
}

pub fn normalize(provider: Provider, raw: Value) -> Result<FederatedIdentity, FederationError> {
    ProviderProfile::parse(provider, raw)?.into_identity()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn google_identity(p: GoogleProfile) -> Result<FederatedIdentity, FederationError> {
    if p.sub.is_empty() {
        return Err(FederationError::malformed(Provider::Google, "empty subject"));
    }
    let email = non_empty(p.email)
        .ok_or_else(|| FederationError::malformed(Provider::Google, "missing email"))?;
    // Google has no username to build a placeholder from.
    if p.email_verified != Some(true) {
        return Err(FederationError::malformed(Provider::Google, "email not verified"));
    }
    let display_name = non_empty(p.name).unwrap_or_else(|| email.clone());

    Ok(FederatedIdentity {
        provider: Provider::Google,
        provider_id: p.sub,
        email,
        display_name,
        avatar_url: non_empty(p.picture),
    })
}

fn github_identity(p: GitHubProfile) -> Result<FederatedIdentity, FederationError> {
    let provider_id = match &p.id {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return Err(FederationError::malformed(Provider::GitHub, "invalid id")),
    };
    if p.login.is_empty() {
        return Err(FederationError::malformed(Provider::GitHub, "empty login"));
    }

    let listed = p
        .emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| p.emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone());

    // GitHub hides the address when the user keeps it private.
    let email = non_empty(listed)
        .or_else(|| non_empty(p.email))
        .unwrap_or_else(|| format!("{}@github.placeholder", p.login));

    Ok(FederatedIdentity {
        provider: Provider::GitHub,
        provider_id,
        email,
        display_name: non_empty(p.name).unwrap_or_else(|| p.login.clone()),
        avatar_url: non_empty(p.avatar_url),
    })
}

fn discord_identity(p: DiscordProfile) -> Result<FederatedIdentity, FederationError> {
    let snowflake: u64 = p
        .id
        .parse()
        .map_err(|_| FederationError::malformed(Provider::Discord, "invalid id"))?;
    // An unverified address must not link to an existing account.
    let email = non_empty(p.email)
        .filter(|_| p.verified == Some(true))
        .unwrap_or_else(|| format!("{}@discord.placeholder", p.username));

    let avatar_url = match non_empty(p.avatar) {
        Some(hash) => format!("{}/avatars/{}/{}.png", DISCORD_CDN, p.id, hash),
        None => format!("{}/embed/avatars/{}.png", DISCORD_CDN, (snowflake >> 22) % 6),
    };

    Ok(FederatedIdentity {
        provider: Provider::Discord,
        provider_id: p.id,
        email,
        display_name: non_empty(p.global_name).unwrap_or_else(|| p.username.clone()),
        avatar_url: Some(avatar_url),
    })
}
