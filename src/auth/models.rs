//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Identity providers a user record can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    GitHub,
    Discord,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
            Provider::GitHub => "github",
            Provider::Discord => "discord",
        }
    }

    /// Providers that can be used for federated login.
    pub fn federated() -> [Provider; 3] {
        [Provider::Google, Provider::GitHub, Provider::Discord]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::GitHub),
            "discord" => Ok(Provider::Discord),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
    pub created_at: Option<String>,
}

impl User {
    /// True once a federated login has claimed this record.
    pub fn has_provider_id(&self) -> bool {
        self.provider_id
            .as_deref()
            .map_or(false, |id| !id.trim().is_empty())
    }
}

/// Provider profile reduced to the fields the account linker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: Provider,
    pub provider_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}
