//! Plugin bookkeeping.
//!
//! The registry assigns plugin ids, answers the id check every API call
//! starts with and selects the function table a plugin binds to.
//!
//! # Example Configuration
//!
//! ```toml
//! [plugins]
//! enabled = true
//!
//! [[plugins.registered]]
//! id = 3
//! name = "Link"
//! version = "1.2.0"
//! ```

pub mod registry;
pub mod traits;

pub use registry::{PluginEntry, PluginRegistry, RegistryError};
pub use traits::{PluginInfo, PluginOrigin};
