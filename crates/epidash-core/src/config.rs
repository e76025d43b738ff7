use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides `backend.base_url`.
pub const BACKEND_URL_ENV: &str = "EPIDASH_BACKEND_URL";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (holds the remembered login name)
    pub config_dir: PathBuf,

    /// Prediction backend settings
    pub backend: BackendConfig,

    /// Forecast screen settings
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the prediction backend
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Number of historical days sent to the model, today included
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Largest horizon the forecast screen accepts
    #[serde(default = "default_max_horizon")]
    pub max_horizon: u32,

    /// Dataset selected when a screen opens
    #[serde(default = "default_dataset")]
    pub default_dataset: String,
}

fn default_window_days() -> u32 {
    100
}

fn default_max_horizon() -> u32 {
    31
}

fn default_dataset() -> String {
    "covid19".to_string()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            max_horizon: default_max_horizon(),
            default_dataset: default_dataset(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("epidash");

        Self {
            config_dir,
            backend: BackendConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    ///
    /// `EPIDASH_BACKEND_URL` overrides the stored backend URL.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            config
        };

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            tracing::info!("Using backend URL from {}", BACKEND_URL_ENV);
            config.backend.base_url = url;
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.backend.base_url, "backend.base_url", &mut result);

        if self.backend.request_timeout_secs == 0 {
            result.add_error(
                "backend.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.backend.request_timeout_secs > 600 {
            result.add_warning(
                "backend.request_timeout_secs",
                "Request timeout is unusually long (>600s)",
            );
        }

        if self.forecast.window_days == 0 {
            result.add_error("forecast.window_days", "Window must cover at least one day");
        }

        if self.forecast.max_horizon == 0 || self.forecast.max_horizon > 365 {
            result.add_error(
                "forecast.max_horizon",
                "Maximum horizon must be between 1 and 365 days",
            );
        }

        if self.forecast.default_dataset.trim().is_empty() {
            result.add_error("forecast.default_dataset", "Default dataset cannot be empty");
        }

        if self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.contains("localhost")
            && !self.backend.base_url.contains("127.0.0.1")
        {
            result.add_warning(
                "backend.base_url",
                "Credentials will be sent over plain http",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("epidash");

        Ok(config_dir.join("config.toml"))
    }
}
