//! Host-side state the plugin API operates on.

pub mod context;
pub mod directory;
pub mod services;
pub mod settings;
pub mod snapshot;

pub use context::{HostContext, Session};
pub use directory::{ChannelRecord, Directory, UserRecord};
pub use services::{
    AudioOutput, BlobStore, ClientControls, ClientRequest, MemoryBlobStore,
    PluginDataTransmission, PluginDirectory, PluginLog, RecordingAudio, RecordingControls,
    RecordingLink, ServerLink, TracingLog,
};
pub use settings::AudioSettings;
pub use snapshot::SessionSnapshot;
