//! CLI argument definitions for the Parley terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use parley_core::ParleyConfig;
use std::path::PathBuf;

/// Parley: talk to a chat widget backend from the terminal.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Backend base URL serving /getresponses and /ask.
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Client identifier sent to the backend.
    #[arg(long = "client-id")]
    pub client_id: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut ParleyConfig) {
        if let Some(ref url) = self.base_url {
            config.service.base_url = url.clone();
        }
        if let Some(ref id) = self.client_id {
            config.service.client_id = id.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "parley",
            "--base-url",
            "http://localhost:8000",
            "--client-id",
            "terralogic_academy",
            "-l",
            "debug",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(args.client_id.as_deref(), Some("terralogic_academy"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["parley", "-c", "/tmp/parley.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/parley.toml"));
    }

    #[test]
    fn test_apply_overrides() {
        let args = CliArgs::parse_from(["parley", "-u", "http://localhost:8000"]);
        let mut config = ParleyConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.service.base_url, "http://localhost:8000");
        // Untouched values keep the loaded configuration
        assert_eq!(config.service.client_id, "lollypop_design");
        assert_eq!(config.general.log_level, "info");
    }
}
