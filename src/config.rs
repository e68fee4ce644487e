use crate::error::GenAiError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const DEFAULT_RESOLUTION: &str = "720p";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Environment variables checked, in order, for the API key.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Tunables for video generation and polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    /// Base URL of the API, ending with `/`.
    pub base_url: String,
    /// The video model to submit jobs to.
    pub model: String,
    /// Resolution hint sent with every request.
    pub resolution: String,
    /// Fixed delay between two status queries.
    pub poll_interval: Duration,
    /// Give up after this many status queries. `None` polls until the operation finishes.
    pub max_polls: Option<u32>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_VIDEO_MODEL.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}

impl VideoConfig {
    /// Builds a configuration from the defaults, overridden by environment variables.
    ///
    /// Recognized variables: `GENAI_BASE_URL`, `GENAI_VIDEO_MODEL`,
    /// `GENAI_VIDEO_RESOLUTION`, `GENAI_POLL_INTERVAL_SECS` and `GENAI_MAX_POLLS`.
    ///
    /// # Errors
    ///
    /// - `GenAiError::InvalidConfig` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, GenAiError> {
        let mut config = Self::default();
        if let Ok(url) = env::var("GENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = env::var("GENAI_VIDEO_MODEL") {
            config.model = model;
        }
        if let Ok(resolution) = env::var("GENAI_VIDEO_RESOLUTION") {
            config.resolution = resolution;
        }
        if let Some(secs) = parse_var::<u64>("GENAI_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<u32>("GENAI_MAX_POLLS")? {
            config.max_polls = Some(max);
        }
        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

/// Resolves the API key from an explicit value or the environment.
pub fn resolve_api_key(api_key: Option<String>) -> Result<String, GenAiError> {
    api_key
        .or_else(|| API_KEY_VARS.iter().find_map(|var| env::var(var).ok()))
        .filter(|key| !key.trim().is_empty())
        .ok_or(GenAiError::MissingApiKey)
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, GenAiError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GenAiError::InvalidConfig { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_environment() {
        let key = resolve_api_key(Some("explicit".to_string())).unwrap();
        assert_eq!(key, "explicit");
    }

    #[test]
    fn blank_key_is_missing() {
        let err = resolve_api_key(Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, GenAiError::MissingApiKey));
    }

    #[test]
    fn defaults_poll_every_ten_seconds_without_cap() {
        let config = VideoConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_polls, None);
        assert_eq!(config.model, DEFAULT_VIDEO_MODEL);
    }
}
