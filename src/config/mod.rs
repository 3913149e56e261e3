//! Configuration loading.
//!
//! The file is optional; a missing file yields [`Config::default`].
//!
//! ```toml
//! [logging]
//! level = "voxlink=debug"
//!
//! [plugins]
//! enabled = true
//!
//! [[plugins.registered]]
//! id = 3
//! name = "Link"
//!
//! [audio]
//! voice_hold = 40
//! transmit = "push_to_talk"
//! ```

mod schema;

pub use schema::{
    AudioConfig, Config, LoggingConfig, PluginsConfig, RegisteredPlugin,
    DEFAULT_NOISE_CANCEL_STRENGTH,
};

use directories::ProjectDirs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("plugin id {0} is registered more than once")]
    DuplicatePlugin(u32),
    #[error("plugin {0} has an empty name")]
    EmptyPluginName(u32),
}

/// `<config_dir>/config.toml` for this application, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "voxlink", "voxlink").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path`, or from [`default_path`] when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) => path,
                None => {
                    tracing::debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for plugin in &self.plugins.registered {
            if !seen.insert(plugin.id) {
                return Err(ConfigError::DuplicatePlugin(plugin.id));
            }
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::EmptyPluginName(plugin.id));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::TransmissionMode;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("config.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.plugins.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = Config::parse(
            r#"
[audio]
voice_hold = 40
transmit = "push_to_talk"

[[plugins.registered]]
id = 3
name = "Link"
"#,
        )
        .unwrap();
        assert_eq!(config.audio.voice_hold, 40);
        assert_eq!(config.audio.transmit, TransmissionMode::PushToTalk);
        assert_eq!(config.audio.max_distance, 15.0);
        assert_eq!(config.plugins.registered[0].name, "Link");
        assert!(config.plugins.registered[0].enabled);
    }

    #[test]
    fn legacy_noise_suppress_takes_the_minimum() {
        let mut audio = AudioConfig::default();
        assert_eq!(audio.effective_noise_cancel_strength(), -30);
        audio.noise_suppress = Some(-40);
        assert_eq!(audio.effective_noise_cancel_strength(), -40);
        audio.noise_suppress = Some(-14);
        assert_eq!(audio.effective_noise_cancel_strength(), -30);
        audio.noise_cancel_strength = 0;
        audio.noise_suppress = None;
        assert_eq!(audio.effective_noise_cancel_strength(), 0);
    }

    #[test]
    fn duplicate_plugin_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[plugins.registered]]\nid = 1\nname = \"a\"\n[[plugins.registered]]\nid = 1\nname = \"b\"\n",
        )
        .unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::DuplicatePlugin(1))
        ));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = Config::default();
        config.plugins.registered.push(RegisteredPlugin {
            id: 9,
            name: "Positional".into(),
            version: Some("1.0.0".into()),
            enabled: false,
        });
        let parsed = Config::parse(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
