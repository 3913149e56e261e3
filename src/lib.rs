//! voxlink: the plugin API host of a voice-chat client.

pub mod api;
pub mod config;
pub mod host;
pub mod logging;
pub mod plugins;

pub use api::{ErrorCode, PluginApi};
pub use config::Config;
