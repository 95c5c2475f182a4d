use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 60;
pub const DEFAULT_CACHE_SIZE: usize = 100;
pub const MIN_CACHE_SIZE: usize = 10;
pub const DEFAULT_COMMENT_CACHE_TTL_MINUTES: f64 = 30.0;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = ".gh-linker.toml";

/// Environment variable consulted when no `gh_path` is configured.
pub const GH_PATH_ENV: &str = "GH_LINKER_GH_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Settings consumed by the fetch service.
///
/// All fields are optional in the file; the tool works with zero config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How long issue and pull request titles stay cached
    pub cache_ttl_minutes: u64,

    /// Maximum entries per cache
    pub cache_size: usize,

    /// Explicit path to the `gh` executable
    pub gh_path: Option<String>,

    /// How long comment data stays cached; fractions of a minute are allowed
    pub comment_cache_ttl_minutes: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            cache_size: DEFAULT_CACHE_SIZE,
            gh_path: None,
            comment_cache_ttl_minutes: DEFAULT_COMMENT_CACHE_TTL_MINUTES,
        }
    }
}

impl Settings {
    /// Load settings from `.gh-linker.toml` in the current directory.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Settings, ConfigError> {
        Self::load_with(None, None)
    }

    /// Load settings for the CLI.
    ///
    /// `gh_path` comes from the first of: `gh_path_flag`, the config file,
    /// `GH_LINKER_GH_PATH`.
    pub fn load_with(
        config: Option<&Path>,
        gh_path_flag: Option<&str>,
    ) -> Result<Settings, ConfigError> {
        let path = config.unwrap_or(Path::new(CONFIG_FILE));
        let settings = if config.is_some() || path.exists() {
            Self::load_from(path)?
        } else {
            Settings::default()
        };
        settings
            .with_gh_path_sources(gh_path_flag, std::env::var(GH_PATH_ENV).ok())
            .validated()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)?;
        settings.validated()
    }

    /// Apply the non-file sources of `gh_path`. A non-blank `flag` always
    /// wins; `env` only fills a path the file left unset.
    pub fn with_gh_path_sources(mut self, flag: Option<&str>, env: Option<String>) -> Self {
        if let Some(flag) = flag.map(str::trim).filter(|p| !p.is_empty()) {
            self.gh_path = Some(flag.to_string());
        } else if self.gh_path().is_none() {
            if let Some(env) = env.filter(|p| !p.trim().is_empty()) {
                self.gh_path = Some(env);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_minutes == 0 {
            return Err(ConfigError::Invalid(
                "cache_ttl_minutes must be a positive integer".to_string(),
            ));
        }
        if self.cache_size < MIN_CACHE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "cache_size must be an integer of {MIN_CACHE_SIZE} or more"
            )));
        }
        if !(self.comment_cache_ttl_minutes.is_finite() && self.comment_cache_ttl_minutes > 0.0) {
            return Err(ConfigError::Invalid(
                "comment_cache_ttl_minutes must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    fn validated(self) -> Result<Settings, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    pub fn title_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    pub fn comment_ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.comment_cache_ttl_minutes * 60.0)
            .unwrap_or(Duration::from_secs(30 * 60))
    }

    /// The explicit tool path, if one is set and non-blank.
    pub fn gh_path(&self) -> Option<&str> {
        self.gh_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}
