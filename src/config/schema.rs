use serde::{Deserialize, Serialize};

use crate::api::types::{PluginId, TransmissionMode};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub plugins: PluginsConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Plugin system configuration (`[plugins]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Enable the plugin API (default: true)
    pub enabled: bool,
    /// Plugins known before any are loaded
    pub registered: Vec<RegisteredPlugin>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            registered: Vec::new(),
        }
    }
}

/// A `[[plugins.registered]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPlugin {
    pub id: PluginId,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Default speex noise cancel strength, in dB.
pub const DEFAULT_NOISE_CANCEL_STRENGTH: i32 = -30;

/// `[audio]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Voice activation hold, in 10 ms frames
    pub voice_hold: i32,
    pub vad_min: f32,
    pub vad_max: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub bloom: f32,
    pub max_distance_volume: f32,
    pub transmit: TransmissionMode,
    pub noise_cancel_strength: i32,
    /// Legacy key from older configuration files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_suppress: Option<i32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice_hold: 50,
            vad_min: 0.80,
            vad_max: 0.98,
            min_distance: 1.0,
            max_distance: 15.0,
            bloom: 0.5,
            max_distance_volume: 0.80,
            transmit: TransmissionMode::VoiceActivation,
            noise_cancel_strength: DEFAULT_NOISE_CANCEL_STRENGTH,
            noise_suppress: None,
        }
    }
}

impl AudioConfig {
    /// Noise cancel strength after folding in the legacy `noise_suppress`
    /// key: the more negative of the two wins, an absent legacy key counts
    /// as 0.
    pub fn effective_noise_cancel_strength(&self) -> i32 {
        self.noise_suppress
            .unwrap_or(0)
            .min(self.noise_cancel_strength)
    }
}
