use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RbxError, Result};
use crate::util::expand_tilde;

const SUBDOMAIN_PLACEHOLDER: &str = "{subdomain}";

fn default_host_template() -> String {
    "https://{subdomain}.roblox.com".into()
}

fn default_subdomain() -> String {
    "apis".into()
}

fn default_user_agent() -> String {
    format!("rbxweb/{}", env!("CARGO_PKG_VERSION"))
}

fn default_pool_size() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

/// Transport-level settings shared by every request a dispatcher sends.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL with a `{subdomain}` placeholder, e.g. `https://{subdomain}.roblox.com`.
    #[serde(default = "default_host_template")]
    pub host_template: String,
    /// Subdomain used when a request does not pick one.
    #[serde(default = "default_subdomain")]
    pub default_subdomain: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Number of HTTP clients kept for reuse; also caps concurrent requests.
    #[serde(default = "default_pool_size")]
    pub client_pool_size: usize,
    /// Per-request timeout. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_template: default_host_template(),
            default_subdomain: default_subdomain(),
            user_agent: default_user_agent(),
            client_pool_size: default_pool_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rbxweb").join("config.json"))
}

impl ClientConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(&path.as_ref().to_string_lossy());
        let content = std::fs::read_to_string(&path)?;
        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| RbxError::parse(path.display().to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `~/.rbxweb/config.json`, or fall back to defaults when it doesn't exist.
    pub fn load_default() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_pool_size == 0 {
            return Err(RbxError::InvalidArgument(
                "clientPoolSize must be at least 1".into(),
            ));
        }
        if !self.host_template.contains(SUBDOMAIN_PLACEHOLDER) {
            return Err(RbxError::InvalidArgument(format!(
                "hostTemplate must contain {SUBDOMAIN_PLACEHOLDER}"
            )));
        }
        Ok(())
    }

    pub fn host_for(&self, subdomain: &str) -> String {
        self.host_template.replace(SUBDOMAIN_PLACEHOLDER, subdomain)
    }

    pub fn default_host(&self) -> String {
        self.host_for(&self.default_subdomain)
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}
