use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Largest page the user_timeline endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 200;

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_min_wait_secs() -> u64 {
    10
}

fn default_max_parse_failures() -> u32 {
    3
}

fn default_api_base_url() -> String {
    "https://api.twitter.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Credentials file. The top-level keys keep the names used by existing
/// config files so they load unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "APIKey", default)]
    pub api_key: String,
    #[serde(rename = "APISecretKey", default)]
    pub api_secret_key: String,
    #[serde(rename = "AccessToken", default)]
    pub access_token: String,
    #[serde(rename = "AccessTokenSecret", default)]
    pub access_token_secret: String,
    /// Tweet ids that must never be deleted, in file order
    #[serde(rename = "Protect", default)]
    pub protect: Vec<String>,
    pub sweep: Option<SweepConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: u64,
    /// Consecutive rate-limit waits allowed for one request; unset retries forever
    pub max_rate_limit_attempts: Option<u32>,
    /// Cumulative rate-limit wait allowed for the whole run; unset is unbounded
    pub max_rate_limit_wait_secs: Option<u64>,
    #[serde(default = "default_max_parse_failures")]
    pub max_parse_failures: u32,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            min_wait_secs: default_min_wait_secs(),
            max_rate_limit_attempts: None,
            max_rate_limit_wait_secs: None,
            max_parse_failures: default_max_parse_failures(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
        }
    }
}

impl SweepConfig {
    pub fn min_wait(&self) -> Duration {
        Duration::from_secs(self.min_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_rate_limit_wait(&self) -> Option<Duration> {
        self.max_rate_limit_wait_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment variable overrides
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_file = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("config file not found: {}", path.display()),
                    )));
                }
                path
            }
            None => Self::find_config_file(),
        };

        let mut config = if config_file.exists() {
            tracing::debug!("Loading config from: {}", config_file.display());
            let content = std::fs::read_to_string(&config_file)?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!("No config file found, using environment variables only");
            Self::empty()
        };

        config.apply_env_overrides()?;

        if config.sweep.is_none() {
            config.sweep = Some(SweepConfig::default());
        }
        if config.logging.is_none() {
            config.logging = Some(LoggingConfig::default());
        }

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn empty() -> Self {
        Config {
            api_key: String::new(),
            api_secret_key: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            protect: Vec::new(),
            sweep: None,
            logging: None,
        }
    }

    /// Find configuration file in the current directory or the XDG config directory
    fn find_config_file() -> PathBuf {
        let current_dir_config = PathBuf::from("tweetsweep.toml");
        if current_dir_config.exists() {
            return current_dir_config;
        }

        let xdg_config = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
                .join("tweetsweep")
                .join("tweetsweep.toml")
        } else if let Ok(home_dir) = env::var("HOME") {
            PathBuf::from(home_dir)
                .join(".config")
                .join("tweetsweep")
                .join("tweetsweep.toml")
        } else {
            PathBuf::new()
        };

        if xdg_config.exists() {
            return xdg_config;
        }

        current_dir_config
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(api_key) = env::var("TWEETSWEEP_API_KEY") {
            self.api_key = api_key;
        }
        if let Ok(api_secret_key) = env::var("TWEETSWEEP_API_SECRET_KEY") {
            self.api_secret_key = api_secret_key;
        }
        if let Ok(access_token) = env::var("TWEETSWEEP_ACCESS_TOKEN") {
            self.access_token = access_token;
        }
        if let Ok(access_token_secret) = env::var("TWEETSWEEP_ACCESS_TOKEN_SECRET") {
            self.access_token_secret = access_token_secret;
        }
        if let Ok(protect) = env::var("TWEETSWEEP_PROTECT") {
            self.protect = protect
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(page_size) = env::var("TWEETSWEEP_PAGE_SIZE") {
            let sweep = self.sweep.get_or_insert_with(SweepConfig::default);
            sweep.page_size = page_size.parse().map_err(|_| {
                ConfigError::InvalidValue("TWEETSWEEP_PAGE_SIZE must be a valid number".to_string())
            })?;
        }
        if let Ok(min_wait) = env::var("TWEETSWEEP_MIN_WAIT_SECS") {
            let sweep = self.sweep.get_or_insert_with(SweepConfig::default);
            sweep.min_wait_secs = min_wait.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "TWEETSWEEP_MIN_WAIT_SECS must be a valid number".to_string(),
                )
            })?;
        }

        if let Ok(level) = env::var("TWEETSWEEP_LOG_LEVEL") {
            let logging = self.logging.get_or_insert_with(LoggingConfig::default);
            logging.level = Some(level);
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.api_key, "APIKey or TWEETSWEEP_API_KEY"),
            (&self.api_secret_key, "APISecretKey or TWEETSWEEP_API_SECRET_KEY"),
            (&self.access_token, "AccessToken or TWEETSWEEP_ACCESS_TOKEN"),
            (
                &self.access_token_secret,
                "AccessTokenSecret or TWEETSWEEP_ACCESS_TOKEN_SECRET",
            ),
        ];
        for (value, name) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired(name.to_string()));
            }
        }

        if let Some(ref sweep) = self.sweep {
            if sweep.page_size == 0 || sweep.page_size > MAX_PAGE_SIZE {
                return Err(ConfigError::InvalidValue(format!(
                    "sweep.page_size must be between 1 and {MAX_PAGE_SIZE}"
                )));
            }
            if sweep.min_wait_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "sweep.min_wait_secs must be greater than zero".to_string(),
                ));
            }
            if sweep.max_rate_limit_attempts == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "sweep.max_rate_limit_attempts must be at least 1 when set".to_string(),
                ));
            }
            url::Url::parse(&sweep.api_base_url).map_err(|e| {
                ConfigError::InvalidValue(format!("sweep.api_base_url is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }

    /// Replace the page size, e.g. from the command line, and re-check it
    pub fn override_page_size(&mut self, page_size: u32) -> Result<(), ConfigError> {
        self.sweep
            .get_or_insert_with(SweepConfig::default)
            .page_size = page_size;
        self.validate()
    }

    pub fn sweep(&self) -> &SweepConfig {
        self.sweep.as_ref().unwrap()
    }

    pub fn logging(&self) -> &LoggingConfig {
        self.logging.as_ref().unwrap()
    }
}
