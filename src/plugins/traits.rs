//! Plugin metadata types.
//!
//! These are serializable so `voxlink plugins` can print them as JSON.

use serde::{Deserialize, Serialize};

use crate::api::types::{PluginId, Version};

/// What the host knows about a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Host-assigned id, passed back on every API call
    pub id: PluginId,
    /// Human-readable plugin name, used as the prefix of its log lines
    pub name: String,
    /// Plugin version as reported by the plugin (semver recommended)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// API table version the plugin bound to, once it has
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<Version>,
    /// Where the registration came from
    pub origin: PluginOrigin,
}

/// How a plugin entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginOrigin {
    /// Listed under `[[plugins.registered]]`
    Config,
    /// Registered at runtime by the plugin manager
    Runtime,
}
