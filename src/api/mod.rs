//! The plugin API.
//!
//! Plugins call into the host through versioned C function tables
//! ([`abi`]). Each call is forwarded to the [`PluginApi`] dispatcher, which
//! runs the work on the single host thread ([`executor`]) and hands the
//! result back through a cancellable promise ([`promise`]). Calling threads
//! wait at most [`API_REQUEST_TIMEOUT`]. Strings and arrays returned to
//! plugins are tracked by the [`ResourceCurator`] until freed.

pub mod abi;
pub mod curator;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod promise;
pub mod sync_call;
pub mod types;
pub mod versions;

pub use abi::{api_table_for, ApiTable, MumbleApiV1_0, MumbleApiV1_2};
pub use curator::{LeakReport, LentBuffer, ResourceCurator, ResourceHandle};
pub use dispatcher::PluginApi;
pub use error::{ApiResult, ErrorCode, ErrorRaw, STATUS_OK};
pub use executor::{HostError, HostExecutor, HostHandle, HostState, HostTask};
pub use promise::{ApiFuture, ApiPromise, PromiseGuard};
pub use sync_call::{call_sync, call_sync_within, API_REQUEST_TIMEOUT};
pub use types::{
    ChannelId, ConnectionHandle, Lent, LentStr, PluginId, SettingValue, SettingsKey,
    TransmissionMode, UserId, Version,
};
pub use versions::{ApiV1_0, ApiV1_2};
