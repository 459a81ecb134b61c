use std::{path::PathBuf, time::Duration};

use bon::Builder;

use crate::error::VaultError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/graphql";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Client settings. Every field has a default; see [`VaultConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct VaultConfig {
    /// GraphQL endpoint
    #[builder(default = DEFAULT_API_URL.to_string(), into)]
    pub api_url: String,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// `limit` sent with every listing query
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
    /// Where the identity token is persisted. Falls back to the platform data dir.
    #[builder(into)]
    pub identity_path: Option<PathBuf>,
    #[builder(into)]
    pub user_agent: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl VaultConfig {
    /// Read `VAULT_API_URL`, `VAULT_POLL_INTERVAL_MS`, `VAULT_PAGE_SIZE` and
    /// `VAULT_IDENTITY_FILE`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, VaultError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VaultError> {
        let mut config = Self::default();

        if let Some(url) = lookup("VAULT_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(ms) = lookup("VAULT_POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| VaultError::Config(format!("VAULT_POLL_INTERVAL_MS={ms}: {e}")))?;
            if ms == 0 {
                return Err(VaultError::Config("VAULT_POLL_INTERVAL_MS must be positive".into()));
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(size) = lookup("VAULT_PAGE_SIZE") {
            config.page_size = size
                .trim()
                .parse()
                .map_err(|e| VaultError::Config(format!("VAULT_PAGE_SIZE={size}: {e}")))?;
        }
        if let Some(path) = lookup("VAULT_IDENTITY_FILE").filter(|v| !v.trim().is_empty()) {
            config.identity_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Service root: the GraphQL URL without its trailing `/graphql`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let url = self.api_url.trim_end_matches('/');
        url.strip_suffix("/graphql").unwrap_or(url).to_string()
    }

    /// Public download URL for a link token
    #[must_use]
    pub fn public_link_url(&self, token: &str) -> String {
        format!("{}/d/{}", self.base_url(), token)
    }

    #[must_use]
    pub fn resolved_identity_path(&self) -> Option<PathBuf> {
        self.identity_path.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "file-vault")
                .map(|dirs| dirs.data_dir().join("user-id"))
        })
    }
}
