use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible API root
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model used for captioning
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Output token budget per caption request
pub const DEFAULT_MAX_TOKENS: u32 = 600;

/// Images per request-batch file
pub const DEFAULT_PER_SHARD: usize = 120;

/// Seconds between two status polls of the same batch
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant that helps people find information. \
You will be asked to caption the images for academic classification task. \
Describe the image in sentences with detailed manner. \
Omit the redundant articles, pronouns, and try to say in shortest words, with organized structure. \
If there is no person, describe the image with objects positions and its features. \
Otherwise, describe the persons, actions and objects with cinematic effects, especially its shot, angle, and actions, \
gender, age, and special features for each person. Include the colors, appearances, features.";

/// User turn text. The trailing space is where per-image alt text used to be appended.
pub const DEFAULT_USER_PROMPT: &str = "Describe the image in sentences with detailed manner. ";

/// What the builder does when a custom id repeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Log a warning and keep writing
    #[default]
    Warn,
    /// Abort before the offending shard is written
    Fail,
}

/// User settings, persisted as JSON. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_prompt: String,
    pub api_base: String,
    pub poll_interval_secs: u64,
    /// Overall wait per batch; `None` waits until a terminal status
    pub poll_timeout_secs: Option<u64>,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_timeout_secs: None,
            duplicate_policy: DuplicatePolicy::Warn,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(settings) => settings.checked(path),
            Err(e) => {
                tracing::warn!("Invalid settings file {:?}, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    /// Replace values that cannot drive a run with their defaults.
    fn checked(mut self, path: &Path) -> Self {
        if self.poll_interval_secs == 0 {
            tracing::warn!(
                "poll_interval_secs in {:?} must be at least 1, using {}",
                path,
                DEFAULT_POLL_INTERVAL_SECS
            );
            self.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings file (~/.config/captioner/settings.json)
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("captioner");

        Self {
            settings_file: config_dir.join("settings.json"),
        }
    }

    /// Use an explicit settings file instead of the default location
    pub fn with_settings_file(path: impl Into<PathBuf>) -> Self {
        Self {
            settings_file: path.into(),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::load(&self.settings_file)
    }
}
