use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};
use crate::types::{CachePolicy, ResolutionStrategy};

/// Top-level configuration for one widget deployment.
///
/// Loaded from `~/.parley/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Backend endpoints and the identity this widget presents to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL that `/getresponses` and `/ask` are resolved against.
    pub base_url: String,
    /// Client identifier sent with every request.
    pub client_id: String,
    /// Model selector forwarded to the inference service.
    pub model_choice: String,
    /// Per-request timeout. Unset leaves timeouts to the transport.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            client_id: "lollypop_design".to_string(),
            model_choice: "google".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Resolution behaviour of the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub cache_policy: CachePolicy,
    pub resolution: ResolutionStrategy,
    /// Escalate substring misses to the inference service.
    pub fallback_to_inference: bool,
    /// Send the session token with lookup requests.
    pub include_session_in_lookup: bool,
    /// Minimum time the typing placeholder stays visible.
    pub typing_delay_ms: u64,
}

impl ConversationConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::Merge,
            resolution: ResolutionStrategy::Substring,
            fallback_to_inference: true,
            include_session_in_lookup: true,
            typing_delay_ms: 1000,
        }
    }
}

/// Fixed bot messages for the failure paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Shown when nothing in the cache matched and no fallback ran.
    pub not_understood: String,
    /// Shown when the inference service answered without usable text.
    pub inference_invalid: String,
    /// Shown when the inference service could not be reached.
    pub inference_unreachable: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            not_understood: "I'm sorry, I didn't understand that. Could you please rephrase?"
                .to_string(),
            inference_invalid: "I did not get a valid response from the server.".to_string(),
            inference_unreachable: "Sorry, I could not reach the server. Please try again later."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.service.model_choice, "google");
        assert!(config.service.request_timeout_secs.is_none());
        assert_eq!(config.conversation.cache_policy, CachePolicy::Merge);
        assert_eq!(config.conversation.resolution, ResolutionStrategy::Substring);
        assert!(config.conversation.fallback_to_inference);
        assert_eq!(config.conversation.typing_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[service]
base_url = "https://bot.example.com"
client_id = "terralogic_academy"
model_choice = "openai"
request_timeout_secs = 15

[conversation]
cache_policy = "replace"
resolution = "exact"
fallback_to_inference = false
include_session_in_lookup = false
typing_delay_ms = 250

[messages]
not_understood = "Pardon?"
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.service.base_url, "https://bot.example.com");
        assert_eq!(config.service.client_id, "terralogic_academy");
        assert_eq!(config.service.request_timeout_secs, Some(15));
        assert_eq!(config.conversation.cache_policy, CachePolicy::Replace);
        assert_eq!(config.conversation.resolution, ResolutionStrategy::Exact);
        assert!(!config.conversation.fallback_to_inference);
        assert!(!config.conversation.include_session_in_lookup);
        assert_eq!(config.conversation.typing_delay_ms, 250);
        assert_eq!(config.messages.not_understood, "Pardon?");
        // Unspecified message keeps its default
        assert_eq!(
            config.messages.inference_invalid,
            MessagesConfig::default().inference_invalid
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[conversation]\nresolution = \"exact\"\n");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.conversation.resolution, ResolutionStrategy::Exact);
        assert_eq!(config.conversation.cache_policy, CachePolicy::Merge);
        assert_eq!(config.service.client_id, "lollypop_design");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.conversation.typing_delay_ms, 1000);
    }

    #[test]
    fn test_load_invalid_policy_is_error() {
        let file = create_temp_config("[conversation]\ncache_policy = \"append\"\n");
        let err = ParleyConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.service.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ParleyConfig::default();
        config.conversation.cache_policy = CachePolicy::Replace;
        config.service.request_timeout_secs = Some(30);
        config.save(&path).unwrap();

        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.conversation.cache_policy, CachePolicy::Replace);
        assert_eq!(reloaded.service.request_timeout_secs, Some(30));
        assert_eq!(reloaded.messages.not_understood, config.messages.not_understood);
    }
}
