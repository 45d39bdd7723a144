use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum blended score for a name to count as a direct match.
    pub match_threshold: f64,
    /// Minimum lead over the runner-up before a top match is trusted.
    pub ambiguity_margin: f64,
    /// How many scored candidates to keep per participant mention.
    pub top_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { match_threshold: 0.72, ambiguity_margin: 0.08, top_candidates: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Applied when a dictation carries a start but no end and no duration.
    pub default_duration_minutes: i64,
    /// Keyword tables for date words: "fr" or "en".
    pub locale: String,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self { default_duration_minutes: 30, locale: "fr".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    /// Upper bound on busy-service checks per confirmation.
    pub max_attempts: u32,
    /// Per-check timeout; an elapsed check counts as a conflict.
    pub call_timeout_seconds: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self { max_attempts: 5, call_timeout_seconds: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub extraction_url: String,
    pub directory_url: String,
    pub availability_url: String,
    pub calendar_url: String,
    pub contacts_url: String,
    /// Ceiling for one prepare/confirm request across all collaborator calls.
    pub request_deadline_seconds: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            extraction_url: "http://localhost:8089/extract".to_string(),
            directory_url: "http://localhost:8089/contacts".to_string(),
            availability_url: "http://localhost:8089/availability".to_string(),
            calendar_url: "http://localhost:8089/calendar".to_string(),
            contacts_url: "http://localhost:8089/contacts".to_string(),
            request_deadline_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 3600 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        // If config doesn't exist, create default
        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "carenda", "carenda")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn test_config_save_load() -> Result<()> {
        // Redirect the config directory so the test never touches the
        // real user configuration.
        let temp_dir = tempdir()?;
        env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let config = Config::default();
        config.save()?;

        let loaded = Config::load()?;
        assert_eq!(loaded.matching.match_threshold, config.matching.match_threshold);
        assert_eq!(loaded.availability.max_attempts, config.availability.max_attempts);

        Ok(())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.matching.match_threshold, 0.72);
        assert_eq!(config.matching.ambiguity_margin, 0.08);
        assert_eq!(config.temporal.default_duration_minutes, 30);
        assert_eq!(config.availability.max_attempts, 5);
        assert_eq!(config.temporal.locale, "fr");
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config)?;
        let parsed: Config = toml::from_str(&serialized)?;
        assert_eq!(parsed.matching.match_threshold, config.matching.match_threshold);
        assert_eq!(parsed.services.extraction_url, config.services.extraction_url);
        assert_eq!(parsed.server.port, config.server.port);
        Ok(())
    }

    #[test]
    fn test_partial_config_uses_section_defaults() -> Result<()> {
        let parsed: Config = toml::from_str(
            "[matching]\nmatch_threshold = 0.8\nambiguity_margin = 0.1\ntop_candidates = 3\n",
        )?;
        assert_eq!(parsed.matching.match_threshold, 0.8);
        assert_eq!(parsed.availability.max_attempts, 5);
        Ok(())
    }
}
