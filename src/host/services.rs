//! Seams between the plugin API and the rest of the client.
//!
//! The dispatcher only talks to these traits; the GUI, the network layer and
//! the audio engine plug in behind them. In-memory implementations live here
//! too and back both the `probe` command and the tests.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

use crate::api::types::{ChannelId, PluginId, TransmissionMode, UserId, Version};

/// Plugins known to the host.
pub trait PluginDirectory: Send + Sync {
    fn contains(&self, id: PluginId) -> bool;
    fn name_of(&self, id: PluginId) -> Option<String>;
}

/// A plugin payload addressed to users on the same server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDataTransmission {
    pub sender: UserId,
    pub receivers: Vec<UserId>,
    pub data: Vec<u8>,
    pub data_id: String,
}

/// Outbound side of a server connection.
pub trait ServerLink: Send + Sync {
    /// Protocol version the server announced.
    fn server_version(&self) -> Version;
    /// Digest of the server certificate.
    fn certificate_digest(&self) -> Vec<u8>;
    /// Ask the server to move `user` into `channel`.
    fn join_channel(&self, user: UserId, channel: ChannelId, passwords: &[String]);
    fn send_plugin_data(&self, message: PluginDataTransmission);
}

/// Local cache of comment and description blobs keyed by hash.
pub trait BlobStore: Send + Sync {
    fn blob(&self, hash: &[u8]) -> Option<Vec<u8>>;
}

/// Requests that change how the local client behaves.
pub trait ClientControls: Send + Sync {
    fn set_transmission_mode(&self, mode: TransmissionMode);
    fn set_audio_mute(&self, muted: bool);
    fn set_audio_deaf(&self, deafened: bool);
    /// Publish a new comment for the local user.
    fn set_comment(&self, user: UserId, comment: &str);
}

pub trait AudioOutput: Send + Sync {
    /// Queue a sound file for playback. Returns `false` if it can't be played.
    fn play_sample(&self, path: &str, volume: f32) -> bool;
}

/// Destination for plugin log lines, already formatted as rich text.
pub trait PluginLog: Send + Sync {
    fn plugin_message(&self, html: &str);
}

/// Writes plugin messages to the `plugin` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl PluginLog for TracingLog {
    fn plugin_message(&self, html: &str) {
        tracing::info!(target: "plugin", "{html}");
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, hash: Vec<u8>, content: Vec<u8>) {
        self.blobs.write().insert(hash, content);
    }
}

impl BlobStore for MemoryBlobStore {
    fn blob(&self, hash: &[u8]) -> Option<Vec<u8>> {
        self.blobs.read().get(hash).cloned()
    }
}

/// A server link that records what would have gone on the wire.
#[derive(Debug)]
pub struct RecordingLink {
    version: Version,
    digest: Vec<u8>,
    joins: Mutex<Vec<(UserId, ChannelId, Vec<String>)>>,
    sent: Mutex<Vec<PluginDataTransmission>>,
}

impl RecordingLink {
    pub fn new(version: Version, digest: Vec<u8>) -> Self {
        Self {
            version,
            digest,
            joins: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn joins(&self) -> Vec<(UserId, ChannelId, Vec<String>)> {
        self.joins.lock().clone()
    }

    pub fn sent(&self) -> Vec<PluginDataTransmission> {
        self.sent.lock().clone()
    }
}

impl ServerLink for RecordingLink {
    fn server_version(&self) -> Version {
        self.version
    }

    fn certificate_digest(&self) -> Vec<u8> {
        self.digest.clone()
    }

    fn join_channel(&self, user: UserId, channel: ChannelId, passwords: &[String]) {
        tracing::debug!(user, channel, "Join channel request");
        self.joins.lock().push((user, channel, passwords.to_vec()));
    }

    fn send_plugin_data(&self, message: PluginDataTransmission) {
        tracing::debug!(
            data_id = %message.data_id,
            receivers = message.receivers.len(),
            "Plugin data transmission"
        );
        self.sent.lock().push(message);
    }
}

/// One recorded [`ClientControls`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    TransmissionMode(TransmissionMode),
    Mute(bool),
    Deaf(bool),
    Comment(UserId, String),
}

#[derive(Debug, Default)]
pub struct RecordingControls {
    requests: Mutex<Vec<ClientRequest>>,
}

impl RecordingControls {
    pub fn requests(&self) -> Vec<ClientRequest> {
        self.requests.lock().clone()
    }
}

impl ClientControls for RecordingControls {
    fn set_transmission_mode(&self, mode: TransmissionMode) {
        self.requests.lock().push(ClientRequest::TransmissionMode(mode));
    }

    fn set_audio_mute(&self, muted: bool) {
        self.requests.lock().push(ClientRequest::Mute(muted));
    }

    fn set_audio_deaf(&self, deafened: bool) {
        self.requests.lock().push(ClientRequest::Deaf(deafened));
    }

    fn set_comment(&self, user: UserId, comment: &str) {
        self.requests
            .lock()
            .push(ClientRequest::Comment(user, comment.to_string()));
    }
}

/// Audio output that accepts every readable file and remembers it.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<(String, f32)>>,
}

impl RecordingAudio {
    pub fn played(&self) -> Vec<(String, f32)> {
        self.played.lock().clone()
    }
}

impl AudioOutput for RecordingAudio {
    fn play_sample(&self, path: &str, volume: f32) -> bool {
        if !std::path::Path::new(path).is_file() {
            return false;
        }
        self.played.lock().push((path.to_string(), volume));
        true
    }
}
