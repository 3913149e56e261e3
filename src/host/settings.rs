//! Live audio settings and typed access by settings key.

use crate::api::error::{ApiResult, ErrorCode};
use crate::api::types::{SettingValue, SettingsKey, TransmissionMode};
use crate::config::AudioConfig;

/// The subset of client settings the plugin API can see, plus the local
/// mute/deaf state.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Voice activation hold time, in 10 ms frames
    pub voice_hold: i32,
    pub vad_min: f32,
    pub vad_max: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub bloom: f32,
    pub max_distance_volume: f32,
    pub transmit: TransmissionMode,
    pub mute: bool,
    pub deaf: bool,
    /// Plugin request to transmit regardless of voice activation
    pub microphone_overwrite: bool,
    pub noise_cancel_strength: i32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

impl AudioSettings {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            voice_hold: config.voice_hold,
            vad_min: config.vad_min,
            vad_max: config.vad_max,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            bloom: config.bloom,
            max_distance_volume: config.max_distance_volume,
            transmit: config.transmit,
            mute: false,
            deaf: false,
            microphone_overwrite: false,
            noise_cancel_strength: config.effective_noise_cancel_strength(),
        }
    }

    /// Current value for `key`, widened to the API's value types.
    pub fn get(&self, key: SettingsKey) -> Option<SettingValue> {
        let value = match key {
            SettingsKey::VoiceHold => SettingValue::Int(i64::from(self.voice_hold)),
            SettingsKey::VadSilenceThreshold => SettingValue::Double(f64::from(self.vad_min)),
            SettingsKey::VadSpeechThreshold => SettingValue::Double(f64::from(self.vad_max)),
            SettingsKey::PositionalMinimumDistance => {
                SettingValue::Double(f64::from(self.min_distance))
            }
            SettingsKey::PositionalMaximumDistance => {
                SettingValue::Double(f64::from(self.max_distance))
            }
            SettingsKey::PositionalBloom => SettingValue::Double(f64::from(self.bloom)),
            SettingsKey::PositionalMinimumVolume => {
                SettingValue::Double(f64::from(self.max_distance_volume))
            }
            SettingsKey::Invalid => return None,
        };
        Some(value)
    }

    /// Store `value` under `key`. The value's type must match the key's.
    pub fn set(&mut self, key: SettingsKey, value: SettingValue) -> ApiResult<()> {
        let slot = match key {
            SettingsKey::VoiceHold => {
                let SettingValue::Int(hold) = value else {
                    return Err(ErrorCode::WrongSettingsType);
                };
                self.voice_hold = saturate_i32(hold);
                return Ok(());
            }
            SettingsKey::VadSilenceThreshold => &mut self.vad_min,
            SettingsKey::VadSpeechThreshold => &mut self.vad_max,
            SettingsKey::PositionalMinimumDistance => &mut self.min_distance,
            SettingsKey::PositionalMaximumDistance => &mut self.max_distance,
            SettingsKey::PositionalBloom => &mut self.bloom,
            SettingsKey::PositionalMinimumVolume => &mut self.max_distance_volume,
            SettingsKey::Invalid => return Err(ErrorCode::UnknownSettingsKey),
        };
        match value {
            SettingValue::Double(v) => {
                // Stored as f32, like the rest of the audio pipeline.
                *slot = v as f32;
                Ok(())
            }
            _ => Err(ErrorCode::WrongSettingsType),
        }
    }
}

fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
