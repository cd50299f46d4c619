//! Startup configuration read from the process environment.
//!
//! Four values are required: the graph store address and credentials, and the
//! GitHub API secret. A `.env` file in the working directory is loaded by the
//! binary before these are read.

use crate::error::ConfigError;
use std::fmt;

/// Graph store address (`http(s)://…`, `jsonl:<path>` or `memory:`).
pub const STORE_URI_VAR: &str = "NEO4J_URI";
/// Graph store user.
pub const STORE_USER_VAR: &str = "NEO4J_USR";
/// Graph store password.
pub const STORE_PASSWORD_VAR: &str = "NEO4J_PWD";
/// Token sent as `Authorization: Bearer` to the GitHub API.
pub const GITHUB_SECRET_VAR: &str = "GITHUB_API_SECRET";
/// Optional Neo4j database name.
pub const STORE_DATABASE_VAR: &str = "NEO4J_DATABASE";
/// Optional GitHub GraphQL endpoint override.
pub const GITHUB_API_URL_VAR: &str = "GITHUB_API_URL";
/// Optional GitHub web root override.
pub const GITHUB_WEB_URL_VAR: &str = "GITHUB_WEB_URL";

/// Default Neo4j database name
pub const DEFAULT_DATABASE: &str = "neo4j";

/// Default GitHub GraphQL endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com/graphql";

/// Default GitHub web root, used for the dependents listing
pub const DEFAULT_GITHUB_WEB_URL: &str = "https://github.com";

/// Everything the crawler needs from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Graph store connection settings
    pub store: StoreSettings,

    /// GitHub access settings
    pub github: GithubSettings,
}

/// Graph store connection settings.
#[derive(Clone)]
pub struct StoreSettings {
    /// Store address; its scheme selects the backend.
    pub uri: String,

    /// Store user.
    pub user: String,

    /// Store password.
    pub password: String,

    /// Database name for multi-database servers.
    pub database: String,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// GitHub access settings.
#[derive(Clone)]
pub struct GithubSettings {
    /// API token.
    pub api_secret: String,

    /// GraphQL endpoint.
    pub api_url: String,

    /// Web root for the dependents listing.
    pub web_url: String,

    /// How many dependents listing pages to follow per crawl.
    pub dependent_pages: usize,
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("api_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("web_url", &self.web_url)
            .field("dependent_pages", &self.dependent_pages)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVariable` for the first required variable
    /// that is unset or empty, checked in the order store URI, user, password,
    /// GitHub secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingVariable(name))
        };
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let uri = required(STORE_URI_VAR)?;
        let user = required(STORE_USER_VAR)?;
        let password = required(STORE_PASSWORD_VAR)?;
        let api_secret = required(GITHUB_SECRET_VAR)?;

        Ok(Self {
            store: StoreSettings {
                uri,
                user,
                password,
                database: optional(STORE_DATABASE_VAR, DEFAULT_DATABASE),
            },
            github: GithubSettings {
                api_secret,
                api_url: optional(GITHUB_API_URL_VAR, DEFAULT_GITHUB_API_URL),
                web_url: optional(GITHUB_WEB_URL_VAR, DEFAULT_GITHUB_WEB_URL),
                dependent_pages: 1,
            },
        })
    }
}
