//! Scalar types shared by the dispatcher, the collaborators and the C tables.

use serde::{Deserialize, Serialize};
use std::ffi::{c_char, CStr};

/// Identifies a loaded plugin.
pub type PluginId = u32;
/// Identifies the active server connection.
pub type ConnectionHandle = i32;
/// Session id of a user on the server.
pub type UserId = u32;
/// Channel id on the server.
pub type ChannelId = i32;

/// Largest payload `send_data` will relay.
pub const MAX_DATA_LENGTH: usize = 1000;
/// Longest data id `send_data` accepts, in bytes.
pub const MAX_DATA_ID_LENGTH: usize = 100;

/// Semantic version, used both for the plugin interface and the server protocol.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl Version {
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// First server protocol version that relays plugin data.
pub const PLUGIN_DATA_MIN_SERVER_VERSION: Version = Version::new(1, 4, 0);

/// How the local user's microphone gets activated.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    Continuous = 0,
    #[default]
    VoiceActivation = 1,
    PushToTalk = 2,
}

impl TransmissionMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Continuous),
            1 => Some(Self::VoiceActivation),
            2 => Some(Self::PushToTalk),
            _ => None,
        }
    }
}

/// Settings a plugin may read or write.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    Invalid = -1,
    VoiceHold = 0,
    VadSilenceThreshold = 1,
    VadSpeechThreshold = 2,
    PositionalMinimumDistance = 3,
    PositionalMaximumDistance = 4,
    PositionalBloom = 5,
    PositionalMinimumVolume = 6,
}

impl SettingsKey {
    /// Unrecognised raw keys map to [`SettingsKey::Invalid`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::VoiceHold,
            1 => Self::VadSilenceThreshold,
            2 => Self::VadSpeechThreshold,
            3 => Self::PositionalMinimumDistance,
            4 => Self::PositionalMaximumDistance,
            5 => Self::PositionalBloom,
            6 => Self::PositionalMinimumVolume,
            _ => Self::Invalid,
        }
    }
}

/// A typed settings value. Accessors never coerce between variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl SettingValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
        }
    }
}

/// A host-owned buffer lent to a plugin.
///
/// The pointer stays valid until the plugin hands it back through
/// `free_memory` or the curator is torn down. For strings `len` counts the
/// bytes before the terminating NUL.
#[derive(Debug, PartialEq, Eq)]
pub struct Lent<T> {
    ptr: *const T,
    len: usize,
}

impl<T> Clone for Lent<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Lent<T> {}

// The pointee is owned by the curator on the host thread; the handle itself
// is just an address travelling back to the caller.
unsafe impl<T> Send for Lent<T> {}

impl<T> Lent<T> {
    pub(crate) fn new(ptr: *const T, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the lent elements.
    ///
    /// # Safety
    ///
    /// The buffer must not have been released yet.
    pub unsafe fn as_slice<'a>(&self) -> &'a [T] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

impl Lent<c_char> {
    /// View the lent string.
    ///
    /// # Safety
    ///
    /// The buffer must not have been released yet.
    pub unsafe fn as_c_str<'a>(&self) -> &'a CStr {
        CStr::from_ptr(self.ptr)
    }
}

/// A lent NUL-terminated UTF-8 string.
pub type LentStr = Lent<c_char>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_order_by_component() {
        assert!(Version::new(1, 3, 9) < PLUGIN_DATA_MIN_SERVER_VERSION);
        assert!(Version::new(1, 4, 0) >= PLUGIN_DATA_MIN_SERVER_VERSION);
        assert_eq!(Version::new(1, 2, 0).to_string(), "1.2.0");
    }

    #[test]
    fn unknown_settings_keys_are_invalid() {
        assert_eq!(SettingsKey::from_raw(0), SettingsKey::VoiceHold);
        assert_eq!(SettingsKey::from_raw(6), SettingsKey::PositionalMinimumVolume);
        assert_eq!(SettingsKey::from_raw(99), SettingsKey::Invalid);
    }

    #[test]
    fn transmission_mode_rejects_unknown_raw() {
        assert_eq!(
            TransmissionMode::from_raw(2),
            Some(TransmissionMode::PushToTalk)
        );
        assert_eq!(TransmissionMode::from_raw(3), None);
    }

    #[test]
    fn transmission_mode_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: TransmissionMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"push_to_talk\"").unwrap();
        assert_eq!(parsed.mode, TransmissionMode::PushToTalk);
    }
}
