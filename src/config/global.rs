//! Global configuration for snipweave.
//!
//! The global configuration file (`~/.snipweave/config.toml`) holds the
//! generation service credential and user-wide defaults. It may contain a
//! secret, so it is written with owner-only permissions on Unix and is never
//! meant to be shared.
//!
//! # File Format
//!
//! ```toml
//! api_key = "sk-or-v1-..."
//! base_url = "https://openrouter.ai/api/v1/"
//! default_model = "openai/gpt-4o-mini"
//! store_path = "~/notes/snippets.json"
//! request_timeout_secs = 60
//! max_parallel_generations = 4
//! ```
//!
//! Every key is optional. The `OPENROUTER_API_KEY` environment variable
//! takes precedence over `api_key` from the file.
//!
//! # Examples
//!
//! ```rust,no_run
//! use snipweave::config::GlobalConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = GlobalConfig::load().await?;
//! config.default_model = Some("openai/gpt-4o-mini".to_string());
//! config.save().await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    API_KEY_ENV_VAR, APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, STORE_FILE_NAME,
};

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn is_default_base_url(url: &str) -> bool {
    url == DEFAULT_BASE_URL
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn is_default_request_timeout_secs(secs: &u64) -> bool {
    *secs == DEFAULT_REQUEST_TIMEOUT_SECS
}

/// User-wide settings stored at `~/.snipweave/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Generation service credential.
    ///
    /// Never logged; `config show` prints it masked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Root of the OpenAI-compatible API.
    #[serde(default = "default_base_url", skip_serializing_if = "is_default_base_url")]
    pub base_url: String,

    /// Model used for generated snippets created without `--model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Snippet store location; `~` and environment variables are expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,

    /// Per-request timeout for the generation service, in seconds.
    #[serde(
        default = "default_request_timeout_secs",
        skip_serializing_if = "is_default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,

    /// Cap on concurrent generations within one wave. Unset means no cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_generations: Option<usize>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: None,
            store_path: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_parallel_generations: None,
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults if the file does not exist.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, else from the default location.
    ///
    /// A missing file yields the default configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No global config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save to the default location.
    pub async fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path).await
    }

    /// Save as pretty TOML, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;

        // The file may hold a credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// `~/.snipweave/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_dir()?.join(CONFIG_FILE_NAME))
    }

    /// The credential to use: `OPENROUTER_API_KEY` when set, else `api_key`.
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        pick_api_key(std::env::var(API_KEY_ENV_VAR).ok(), self.api_key.as_deref())
    }

    /// The snippet store file, with `~` and environment variables expanded.
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(raw) => expand_path(raw),
            None => Ok(app_dir()?.join(STORE_FILE_NAME)),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The stored credential with all but its first characters hidden.
    #[must_use]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(mask_secret)
    }
}

/// Expand `~` and `$VARS` in a user-supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn app_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
        .join(APP_DIR_NAME))
}

fn pick_api_key(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
    from_env
        .filter(|key| !key.trim().is_empty())
        .or_else(|| from_file.filter(|key| !key.trim().is_empty()).map(str::to_string))
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(6).collect();
    if secret.chars().count() <= 6 {
        "*".repeat(secret.chars().count())
    } else {
        format!("{visible}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1/");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.api_key.is_none());
        assert!(config.max_parallel_generations.is_none());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sub").join("config.toml");

        let config = GlobalConfig {
            api_key: Some("sk-or-secret".to_string()),
            default_model: Some("openai/gpt-4o".to_string()),
            max_parallel_generations: Some(3),
            ..GlobalConfig::default()
        };
        config.save_to(&path).await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_defaults_are_not_written() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        GlobalConfig::default().save_to(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("base_url"));
        assert!(!raw.contains("request_timeout_secs"));
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let config =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "api_key = [").unwrap();
        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse global config"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        GlobalConfig::default().save_to(&path).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_environment_key_takes_precedence() {
        assert_eq!(pick_api_key(Some("env".to_string()), Some("file")).as_deref(), Some("env"));
        assert_eq!(pick_api_key(Some(" ".to_string()), Some("file")).as_deref(), Some("file"));
        assert_eq!(pick_api_key(None, Some("")), None);
        assert_eq!(pick_api_key(None, None), None);
    }

    #[test]
    fn test_store_path_expansion() {
        let config = GlobalConfig {
            store_path: Some("/tmp/snippets.json".to_string()),
            ..GlobalConfig::default()
        };
        assert_eq!(config.resolved_store_path().unwrap(), PathBuf::from("/tmp/snippets.json"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/s.json").unwrap(), home.join("s.json"));
        }
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-or-v1-abcdef"), "sk-or-…");
        assert_eq!(mask_secret("short"), "*****");
    }
}
