use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{geolocation::GeolocationOptions, model::Coordinate, provider::openweather};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Pretoria, South Africa. Used whenever geolocation does not produce a position.
pub const DEFAULT_POSITION: Coordinate = Coordinate::new(-25.7458, 28.1859);

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Where the startup position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationSource {
    /// Approximate position from the public IP address.
    #[default]
    Ip,
    /// The `position` configured below.
    Fixed,
    /// No geolocation; always start at the default position.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub source: GeolocationSource,
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub position: Option<Coordinate>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            source: GeolocationSource::default(),
            enable_high_accuracy: true,
            timeout_ms: 5000,
            maximum_age_ms: 0,
            position: None,
        }
    }
}

impl GeolocationConfig {
    pub fn options(&self) -> GeolocationOptions {
        GeolocationOptions {
            enable_high_accuracy: self.enable_high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.maximum_age_ms),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// search_limit = 5
///
/// [default_position]
/// latitude = -25.7458
/// longitude = 28.1859
///
/// [geolocation]
/// source = "ip"
/// timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub search_limit: usize,
    pub default_position: Coordinate,
    pub geolocation: GeolocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: openweather::DEFAULT_BASE_URL.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            default_position: DEFAULT_POSITION,
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl Config {
    /// API key from the environment, falling back to the stored one.
    pub fn api_key(&self) -> Result<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    pub fn resolve_api_key(&self, env_value: Option<String>) -> Result<String> {
        env_value
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured for OpenWeather.\n\
                     Hint: run `weathermap configure` or set {API_KEY_ENV}."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path of the persisted theme flag.
    pub fn theme_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("theme.json"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weathermap", "weathermap")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
