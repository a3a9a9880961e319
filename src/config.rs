//! Configuration file parser for the rules file (`rules.toml` by default).
//!
//! The file is required. `MINIFLUX_URL` overrides `miniflux_url` when set,
//! and the API key is never read from the file: it comes from
//! `MINIFLUX_API_KEY` or the file named by `MINIFLUX_API_KEY_FILE`.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const URL_ENV: &str = "MINIFLUX_URL";
pub const API_KEY_ENV: &str = "MINIFLUX_API_KEY";
pub const API_KEY_FILE_ENV: &str = "MINIFLUX_API_KEY_FILE";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("miniflux_url is required (set it in the config file or via MINIFLUX_URL)")]
    MissingUrl,

    #[error("miniflux_url is not a valid http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("rule {index}: name is required")]
    MissingRuleName { index: usize },

    #[error("rule {index} ({name}): action must be 'read' or 'remove', got '{action}'")]
    InvalidAction {
        index: usize,
        name: String,
        action: String,
    },

    #[error("MINIFLUX_API_KEY or MINIFLUX_API_KEY_FILE environment variable is required")]
    MissingApiKey,

    #[error("Failed to read API key file '{}': {source}", .path.display())]
    ApiKeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("API key file '{}' is empty", .path.display())]
    EmptyApiKeyFile { path: PathBuf },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A single filtering rule.
///
/// Every pattern is an unanchored regular expression; an empty pattern places
/// no constraint on its field. A rule with no patterns matches every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub name: String,
    /// Pattern for the parent feed's title.
    pub feed: String,
    pub author: String,
    /// Pattern for the entry title.
    pub title: String,
    pub content: String,
    /// `read` or `remove`, case-insensitive.
    pub action: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Miniflux instance.
    pub miniflux_url: String,

    /// Seconds between runs. 0 = run once and exit.
    pub interval: u64,

    /// Rules in evaluation order; the first matching rule wins.
    pub rules: Vec<Rule>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["miniflux_url", "interval", "rules"];
    const KNOWN_RULE_KEYS: [&'static str; 6] =
        ["name", "feed", "author", "title", "content", "action"];

    /// Load, apply the `MINIFLUX_URL` override, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?.with_url_override(std::env::var(URL_ENV).ok());
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            rules = config.rules.len(),
            interval_secs = config.interval,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Read and parse the file without validating it.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading something absurd
        let meta = std::fs::metadata(path)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse TOML content. Unknown keys are logged and ignored.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        Ok(toml::from_str(content)?)
    }

    /// Replace `miniflux_url` with `url` when it is present and non-empty.
    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(url = %url, "Using Miniflux URL from {}", URL_ENV);
            self.miniflux_url = url;
        }
        self
    }

    /// Check required fields and action tokens.
    ///
    /// Regex validity is checked later, when the matcher compiles the rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.miniflux_url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        let url =
            Url::parse(&self.miniflux_url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.name.is_empty() {
                return Err(ConfigError::MissingRuleName { index });
            }

            let action = rule.action.to_lowercase();
            if action != "read" && action != "remove" {
                return Err(ConfigError::InvalidAction {
                    index,
                    name: rule.name.clone(),
                    action: rule.action.clone(),
                });
            }
        }

        Ok(())
    }

    /// Delay between runs, or `None` for single-run mode.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval > 0).then(|| Duration::from_secs(self.interval))
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }

    let Some(rules) = raw.get("rules").and_then(|r| r.as_array()) else {
        return;
    };
    for (index, rule) in rules.iter().enumerate() {
        let Some(table) = rule.as_table() else {
            continue;
        };
        for key in table.keys() {
            if !Config::KNOWN_RULE_KEYS.contains(&key.as_str()) {
                tracing::warn!(rule = index, key = %key, "Unknown key in rule, ignoring");
            }
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Read the API key from `MINIFLUX_API_KEY`, falling back to the file named by
/// `MINIFLUX_API_KEY_FILE`.
pub fn api_key_from_env() -> Result<SecretString, ConfigError> {
    resolve_api_key(
        std::env::var(API_KEY_ENV).ok(),
        std::env::var_os(API_KEY_FILE_ENV).map(PathBuf::from),
    )
}

/// Pick the API key: a non-empty `direct` value wins, then the trimmed
/// contents of `key_file`.
pub fn resolve_api_key(
    direct: Option<String>,
    key_file: Option<PathBuf>,
) -> Result<SecretString, ConfigError> {
    if let Some(key) = direct.filter(|k| !k.is_empty()) {
        return Ok(SecretString::from(key));
    }

    let Some(path) = key_file.filter(|p| !p.as_os_str().is_empty()) else {
        return Err(ConfigError::MissingApiKey);
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ApiKeyFile {
        path: path.clone(),
        source,
    })?;

    let key = content.trim();
    if key.is_empty() {
        return Err(ConfigError::EmptyApiKeyFile { path });
    }
    Ok(SecretString::from(key.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
