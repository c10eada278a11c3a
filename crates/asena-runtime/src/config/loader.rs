//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults, then any base config passed to [`ConfigLoader::merge`]
//! 2. Profile-specific config file (`asena.{profile}.toml`)
//! 3. Main config file (`asena.toml` or `config.toml`)
//! 4. Environment variables (`ASENA_*`)
//! 5. Single-key overrides from [`ConfigLoader::set`]
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `ASENA_` prefix with `__` as separator:
//!
//! - `ASENA_BOT__HANDLERS='^[#]'` → `bot.handlers = "^[#]"`
//! - `ASENA_CONNECTION__URL=ws://bridge:8765` → `connection.url = "ws://bridge:8765"`
//! - `ASENA_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use asena_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .set("bot.auto_read", true)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::AsenaConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ASENA_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting `dev`/`prod` shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `ASENA_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("ASENA_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    base: Figment,
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            base: Figment::new(),
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Replaces the built-in defaults with `config`; files and env still
    /// override it.
    pub fn merge(mut self, config: AsenaConfig) -> Self {
        self.base = self.base.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key after every other source.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<AsenaConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: AsenaConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            url = %config.connection.url,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AsenaConfig::default()));
        figment = figment.merge(self.base.clone());

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("asena"));
        }
        paths
    }

    /// Searches `search_paths × base names`; the profile variant of a base
    /// name is merged first, and the search stops at the first base file.
    #[cfg(feature = "toml-config")]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for stem in ["asena", "config"] {
                let profile_path = search_path.join(format!("{stem}.{}.toml", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(&profile_path));
                }

                let base_path = search_path.join(format!("{stem}.toml"));
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(&base_path));
                }
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }

    #[cfg(not(feature = "toml-config"))]
    fn load_config_files(&self, figment: Figment) -> Figment {
        trace!(paths = ?self.resolve_search_paths(), "File configuration disabled");
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<AsenaConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, plus env overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<AsenaConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use asena_framework::WorkType;

    #[test]
    fn test_defaults_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.bot.handlers, "^[.,!]");
        assert_eq!(config.connection.reconnect_delay_ms, 300);
        assert_eq!(config.connection.logout_exit_delay_ms, 3000);
        assert!(!config.bot.delete_fallthrough);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("asena.production.toml"),
            "[bot]\nwork_type = \"private\"\nauto_read = true\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("asena.toml"),
            "[bot]\nauto_read = false\nsudo = [\"15551234567\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("prod")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.bot.work_type, WorkType::Private);
        assert!(!config.bot.auto_read);
        assert_eq!(config.bot.sudo, ["15551234567"]);
    }

    #[test]
    fn test_set_overrides_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .set("connection.url", "wss://bridge.example:443")
            .load()
            .unwrap();
        assert_eq!(config.connection.url, "wss://bridge.example:443");
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/asena.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }
}
