use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REASONING_EFFORT: &str = "medium";
pub const DEFAULT_VERBOSITY: &str = "medium";
pub const DEFAULT_REASONING_SUMMARY: &str = "auto";

/// The three reasoning knobs the request builder reads.
///
/// Values are passed through as strings; the summary value `"null"` is
/// special-cased by the builder.
pub trait ReasoningPreferences {
    fn reasoning_effort(&self) -> String;
    fn verbosity(&self) -> String;
    fn reasoning_summary(&self) -> String;
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// API base URL, e.g. `https://api.openai.com/v1`
    pub base_url: Option<String>,
    /// Model used when none is given on the command line
    pub default_model: Option<String>,
    /// Reasoning effort sent for reasoning-capable models (`low`, `medium`, `high`)
    pub reasoning_effort: Option<String>,
    /// Answer verbosity sent for reasoning-capable models
    pub verbosity: Option<String>,
    /// Reasoning summary preference; `null` requests no summary
    pub reasoning_summary: Option<String>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        match key {
            ConfigKey::BaseUrl => self.base_url.as_deref(),
            ConfigKey::DefaultModel => self.default_model.as_deref(),
            ConfigKey::ReasoningEffort => self.reasoning_effort.as_deref(),
            ConfigKey::Verbosity => self.verbosity.as_deref(),
            ConfigKey::ReasoningSummary => self.reasoning_summary.as_deref(),
        }
    }

    pub fn set(&mut self, key: ConfigKey, value: Option<String>) {
        let slot = match key {
            ConfigKey::BaseUrl => &mut self.base_url,
            ConfigKey::DefaultModel => &mut self.default_model,
            ConfigKey::ReasoningEffort => &mut self.reasoning_effort,
            ConfigKey::Verbosity => &mut self.verbosity,
            ConfigKey::ReasoningSummary => &mut self.reasoning_summary,
        };
        *slot = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
}

impl ReasoningPreferences for Config {
    fn reasoning_effort(&self) -> String {
        self.reasoning_effort
            .clone()
            .unwrap_or_else(|| DEFAULT_REASONING_EFFORT.to_string())
    }

    fn verbosity(&self) -> String {
        self.verbosity
            .clone()
            .unwrap_or_else(|| DEFAULT_VERBOSITY.to_string())
    }

    fn reasoning_summary(&self) -> String {
        self.reasoning_summary
            .clone()
            .unwrap_or_else(|| DEFAULT_REASONING_SUMMARY.to_string())
    }
}

/// Fixed preferences, for embedding without a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPreferences {
    pub effort: String,
    pub verbosity: String,
    pub summary: String,
}

impl Default for StaticPreferences {
    fn default() -> Self {
        Self {
            effort: DEFAULT_REASONING_EFFORT.to_string(),
            verbosity: DEFAULT_VERBOSITY.to_string(),
            summary: DEFAULT_REASONING_SUMMARY.to_string(),
        }
    }
}

impl ReasoningPreferences for StaticPreferences {
    fn reasoning_effort(&self) -> String {
        self.effort.clone()
    }

    fn verbosity(&self) -> String {
        self.verbosity.clone()
    }

    fn reasoning_summary(&self) -> String {
        self.summary.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    DefaultModel,
    ReasoningEffort,
    Verbosity,
    ReasoningSummary,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::BaseUrl,
        ConfigKey::DefaultModel,
        ConfigKey::ReasoningEffort,
        ConfigKey::Verbosity,
        ConfigKey::ReasoningSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::DefaultModel => "default-model",
            ConfigKey::ReasoningEffort => "reasoning-effort",
            ConfigKey::Verbosity => "verbosity",
            ConfigKey::ReasoningSummary => "reasoning-summary",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| {
                let known = ConfigKey::ALL.map(ConfigKey::as_str).join(", ");
                format!("unknown config key: {value} (expected one of: {known})")
            })
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
