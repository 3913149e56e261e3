//! Plugin registry for id assignment and lookup.
//!
//! The registry is the authority the API consults when it validates the
//! plugin id passed on every call, and the source of the name used to
//! prefix plugin log lines.

use crate::api::abi::{api_table_for, ApiTable};
use crate::api::error::ApiResult;
use crate::api::types::{PluginId, Version};
use crate::config::PluginsConfig;
use crate::host::PluginDirectory;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

use super::traits::{PluginInfo, PluginOrigin};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("every plugin id is in use")]
    IdsExhausted,
}

/// Entry for a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    /// Plugin metadata
    pub info: PluginInfo,
    /// Whether calls from this plugin are accepted
    pub enabled: bool,
}

/// Registry for known plugins.
///
/// Thread-safe: the host thread validates ids while the plugin manager
/// registers and unregisters from its own thread.
pub struct PluginRegistry {
    /// Registered plugins keyed by id
    plugins: RwLock<BTreeMap<PluginId, PluginEntry>>,
    /// Whether the plugin system is enabled
    enabled: bool,
}

impl PluginRegistry {
    /// Create a registry seeded with the configured plugins.
    pub fn new(config: &PluginsConfig) -> Self {
        let registry = Self {
            plugins: RwLock::new(BTreeMap::new()),
            enabled: config.enabled,
        };

        if config.enabled {
            registry.seed(config);
        }

        registry
    }

    fn seed(&self, config: &PluginsConfig) {
        let mut plugins = self.plugins.write();

        for registered in &config.registered {
            let entry = PluginEntry {
                info: PluginInfo {
                    id: registered.id,
                    name: registered.name.clone(),
                    version: registered.version.clone(),
                    api_version: None,
                    origin: PluginOrigin::Config,
                },
                enabled: registered.enabled,
            };

            tracing::info!(
                plugin_id = registered.id,
                name = %registered.name,
                enabled = registered.enabled,
                "Registered plugin from config"
            );

            plugins.insert(registered.id, entry);
        }
    }

    /// Register a plugin at runtime and assign it the lowest unused id.
    pub fn register(&self, name: &str, version: Option<&str>) -> Result<PluginId, RegistryError> {
        let mut plugins = self.plugins.write();
        let id = lowest_unused(plugins.keys().copied(), PluginId::MAX)
            .ok_or(RegistryError::IdsExhausted)?;
        plugins.insert(
            id,
            PluginEntry {
                info: PluginInfo {
                    id,
                    name: name.to_string(),
                    version: version.map(str::to_string),
                    api_version: None,
                    origin: PluginOrigin::Runtime,
                },
                enabled: true,
            },
        );
        tracing::info!(plugin_id = id, name, "Registered plugin");
        Ok(id)
    }

    /// Forget a plugin. Later calls carrying its id fail validation.
    pub fn unregister(&self, id: PluginId) -> Option<PluginEntry> {
        let removed = self.plugins.write().remove(&id);
        if removed.is_some() {
            tracing::info!(plugin_id = id, "Unregistered plugin");
        }
        removed
    }

    /// Select the API table `id` asked for and remember the version.
    pub fn bind_api(&self, id: PluginId, version: Version) -> ApiResult<ApiTable> {
        let table = api_table_for(version)?;
        if let Some(entry) = self.plugins.write().get_mut(&id) {
            entry.info.api_version = Some(version);
            tracing::debug!(plugin_id = id, %version, "Plugin bound API table");
        }
        Ok(table)
    }

    /// Get a plugin entry by id.
    pub fn get(&self, id: PluginId) -> Option<PluginEntry> {
        self.plugins.read().get(&id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<PluginId> {
        self.plugins
            .read()
            .values()
            .find(|entry| entry.info.name == name)
            .map(|entry| entry.info.id)
    }

    /// Check if the plugin system is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot of every entry's metadata, ascending by id.
    pub fn infos(&self) -> Vec<PluginInfo> {
        self.plugins
            .read()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }
}

/// Lowest id in `0..=last` missing from the ascending `taken`.
fn lowest_unused(taken: impl IntoIterator<Item = PluginId>, last: PluginId) -> Option<PluginId> {
    let mut candidate = 0;
    for id in taken {
        if id != candidate {
            break;
        }
        if candidate == last {
            return None;
        }
        candidate += 1;
    }
    Some(candidate)
}

impl PluginDirectory for PluginRegistry {
    fn contains(&self, id: PluginId) -> bool {
        self.enabled
            && self
                .plugins
                .read()
                .get(&id)
                .is_some_and(|entry| entry.enabled)
    }

    fn name_of(&self, id: PluginId) -> Option<String> {
        if !self.contains(id) {
            return None;
        }
        self.plugins.read().get(&id).map(|entry| entry.info.name.clone())
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("enabled", &self.enabled)
            .field("plugin_count", &self.plugins.read().len())
            .finish_non_exhaustive()
    }
}
