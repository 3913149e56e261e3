//! C function tables handed to plugins.
//!
//! Every entry is a thin `extern "C"` shim: forward to the installed
//! [`PluginApi`] through its blocking trait methods, write the
//! out-parameters on success and return the raw status. Out-parameters are
//! left untouched on failure. A missing pointer argument yields
//! `GenericError`, but only for a caller whose id checks out. No panic
//! crosses this boundary.

use parking_lot::RwLock;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::dispatcher::PluginApi;
use super::error::{status_of, ApiResult, ErrorCode, ErrorRaw, STATUS_OK};
use super::executor::panic_message;
use super::sync_call::call_sync;
use super::types::{
    ChannelId, ConnectionHandle, Lent, PluginId, SettingsKey, UserId, Version,
};
use super::versions::{ApiV1_0, ApiV1_2};

static INSTALLED: RwLock<Option<PluginApi>> = parking_lot::const_rwlock(None);

/// Route every table entry to `api`. Returns the previously installed one.
pub fn install(api: PluginApi) -> Option<PluginApi> {
    tracing::debug!("Installing plugin API");
    INSTALLED.write().replace(api)
}

pub fn uninstall() -> Option<PluginApi> {
    INSTALLED.write().take()
}

pub fn installed() -> Option<PluginApi> {
    INSTALLED.read().clone()
}

const NULL_ARGUMENT: ErrorRaw = ErrorCode::GenericError.raw();

fn guarded(entry: &'static str, body: impl FnOnce(&PluginApi) -> ErrorRaw) -> ErrorRaw {
    // Clone out of the lock so a slow call never blocks `install`.
    let Some(api) = installed() else {
        tracing::warn!(entry, "Plugin API called with no host installed");
        return ErrorCode::InternalError.raw();
    };
    match catch_unwind(AssertUnwindSafe(|| body(&api))) {
        Ok(status) => status,
        Err(payload) => {
            tracing::error!(
                entry,
                panic = panic_message(payload.as_ref()),
                "Panic in plugin API entry"
            );
            ErrorCode::InternalError.raw()
        }
    }
}

/// Status for a call missing a required pointer. The caller's id is still
/// checked first, so an unknown plugin gets `InvalidPluginId` either way.
fn null_argument(entry: &'static str, caller: PluginId) -> ErrorRaw {
    guarded(entry, |api| match call_sync(|p| api.verify_caller_v1_0(caller, p)) {
        Ok(()) => NULL_ARGUMENT,
        Err(code) => code.raw(),
    })
}

/// # Safety
/// `out` must be valid for a write of `T`.
unsafe fn write_out<T>(out: *mut T, result: ApiResult<T>) -> ErrorRaw {
    match result {
        Ok(value) => {
            out.write(value);
            STATUS_OK
        }
        Err(code) => code.raw(),
    }
}

/// # Safety
/// Both pointers must be valid for writes.
unsafe fn write_array<T>(items: *mut *mut T, count: *mut usize, result: ApiResult<Lent<T>>) -> ErrorRaw {
    match result {
        Ok(lent) => {
            items.write(lent.as_ptr().cast_mut());
            count.write(lent.len());
            STATUS_OK
        }
        Err(code) => code.raw(),
    }
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// # Safety
/// Unless `len` is zero, `ptr` must be null or valid for `len` reads.
unsafe fn read_slice<T: Clone>(ptr: *const T, len: usize) -> Option<Vec<T>> {
    if len == 0 {
        Some(Vec::new())
    } else if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(ptr, len).to_vec())
    }
}

unsafe extern "C" fn free_memory(caller: PluginId, pointer: *const c_void) -> ErrorRaw {
    guarded("free_memory", |api| status_of(&api.free_memory(caller, pointer as usize)))
}

unsafe extern "C" fn get_active_server_connection(
    caller: PluginId,
    connection: *mut ConnectionHandle,
) -> ErrorRaw {
    if connection.is_null() {
        return null_argument("get_active_server_connection", caller);
    }
    guarded("get_active_server_connection", |api| unsafe {
        write_out(connection, api.get_active_server_connection(caller))
    })
}

unsafe extern "C" fn is_connection_synchronized(
    caller: PluginId,
    connection: ConnectionHandle,
    synchronized: *mut bool,
) -> ErrorRaw {
    if synchronized.is_null() {
        return null_argument("is_connection_synchronized", caller);
    }
    guarded("is_connection_synchronized", |api| unsafe {
        write_out(synchronized, api.is_connection_synchronized(caller, connection))
    })
}

unsafe extern "C" fn get_local_user_id(
    caller: PluginId,
    connection: ConnectionHandle,
    user: *mut UserId,
) -> ErrorRaw {
    if user.is_null() {
        return null_argument("get_local_user_id", caller);
    }
    guarded("get_local_user_id", |api| unsafe {
        write_out(user, api.get_local_user_id(caller, connection))
    })
}

unsafe extern "C" fn get_user_name(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    name: *mut *const c_char,
) -> ErrorRaw {
    if name.is_null() {
        return null_argument("get_user_name", caller);
    }
    guarded("get_user_name", |api| unsafe {
        write_out(name, api.get_user_name(caller, connection, user).map(|s| s.as_ptr()))
    })
}

unsafe extern "C" fn get_channel_name(
    caller: PluginId,
    connection: ConnectionHandle,
    channel: ChannelId,
    name: *mut *const c_char,
) -> ErrorRaw {
    if name.is_null() {
        return null_argument("get_channel_name", caller);
    }
    guarded("get_channel_name", |api| unsafe {
        write_out(
            name,
            api.get_channel_name(caller, connection, channel).map(|s| s.as_ptr()),
        )
    })
}

unsafe extern "C" fn get_all_users(
    caller: PluginId,
    connection: ConnectionHandle,
    users: *mut *mut UserId,
    user_count: *mut usize,
) -> ErrorRaw {
    if users.is_null() || user_count.is_null() {
        return null_argument("get_all_users", caller);
    }
    guarded("get_all_users", |api| unsafe {
        write_array(users, user_count, api.get_all_users(caller, connection))
    })
}

unsafe extern "C" fn get_all_channels(
    caller: PluginId,
    connection: ConnectionHandle,
    channels: *mut *mut ChannelId,
    channel_count: *mut usize,
) -> ErrorRaw {
    if channels.is_null() || channel_count.is_null() {
        return null_argument("get_all_channels", caller);
    }
    guarded("get_all_channels", |api| unsafe {
        write_array(channels, channel_count, api.get_all_channels(caller, connection))
    })
}

unsafe extern "C" fn get_channel_of_user(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    channel: *mut ChannelId,
) -> ErrorRaw {
    if channel.is_null() {
        return null_argument("get_channel_of_user", caller);
    }
    guarded("get_channel_of_user", |api| unsafe {
        write_out(channel, api.get_channel_of_user(caller, connection, user))
    })
}

unsafe extern "C" fn get_users_in_channel(
    caller: PluginId,
    connection: ConnectionHandle,
    channel: ChannelId,
    users: *mut *mut UserId,
    user_count: *mut usize,
) -> ErrorRaw {
    if users.is_null() || user_count.is_null() {
        return null_argument("get_users_in_channel", caller);
    }
    guarded("get_users_in_channel", |api| unsafe {
        write_array(
            users,
            user_count,
            api.get_users_in_channel(caller, connection, channel),
        )
    })
}

unsafe extern "C" fn get_local_user_transmission_mode(
    caller: PluginId,
    mode: *mut i32,
) -> ErrorRaw {
    if mode.is_null() {
        return null_argument("get_local_user_transmission_mode", caller);
    }
    guarded("get_local_user_transmission_mode", |api| unsafe {
        write_out(
            mode,
            api.get_local_user_transmission_mode(caller).map(|m| m as i32),
        )
    })
}

unsafe extern "C" fn is_user_locally_muted(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    muted: *mut bool,
) -> ErrorRaw {
    if muted.is_null() {
        return null_argument("is_user_locally_muted", caller);
    }
    guarded("is_user_locally_muted", |api| unsafe {
        write_out(muted, api.is_user_locally_muted(caller, connection, user))
    })
}

unsafe extern "C" fn is_local_user_muted(caller: PluginId, muted: *mut bool) -> ErrorRaw {
    if muted.is_null() {
        return null_argument("is_local_user_muted", caller);
    }
    guarded("is_local_user_muted", |api| unsafe {
        write_out(muted, api.is_local_user_muted(caller))
    })
}

unsafe extern "C" fn is_local_user_deafened(caller: PluginId, deafened: *mut bool) -> ErrorRaw {
    if deafened.is_null() {
        return null_argument("is_local_user_deafened", caller);
    }
    guarded("is_local_user_deafened", |api| unsafe {
        write_out(deafened, api.is_local_user_deafened(caller))
    })
}

unsafe extern "C" fn get_user_hash(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    hash: *mut *const c_char,
) -> ErrorRaw {
    if hash.is_null() {
        return null_argument("get_user_hash", caller);
    }
    guarded("get_user_hash", |api| unsafe {
        write_out(hash, api.get_user_hash(caller, connection, user).map(|s| s.as_ptr()))
    })
}

unsafe extern "C" fn get_server_hash(
    caller: PluginId,
    connection: ConnectionHandle,
    hash: *mut *const c_char,
) -> ErrorRaw {
    if hash.is_null() {
        return null_argument("get_server_hash", caller);
    }
    guarded("get_server_hash", |api| unsafe {
        write_out(hash, api.get_server_hash(caller, connection).map(|s| s.as_ptr()))
    })
}

unsafe extern "C" fn get_user_comment(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    comment: *mut *const c_char,
) -> ErrorRaw {
    if comment.is_null() {
        return null_argument("get_user_comment", caller);
    }
    guarded("get_user_comment", |api| unsafe {
        write_out(
            comment,
            api.get_user_comment(caller, connection, user).map(|s| s.as_ptr()),
        )
    })
}

unsafe extern "C" fn get_channel_description(
    caller: PluginId,
    connection: ConnectionHandle,
    channel: ChannelId,
    description: *mut *const c_char,
) -> ErrorRaw {
    if description.is_null() {
        return null_argument("get_channel_description", caller);
    }
    guarded("get_channel_description", |api| unsafe {
        write_out(
            description,
            api.get_channel_description(caller, connection, channel)
                .map(|s| s.as_ptr()),
        )
    })
}

unsafe extern "C" fn request_local_user_transmission_mode(caller: PluginId, mode: i32) -> ErrorRaw {
    guarded("request_local_user_transmission_mode", |api| {
        status_of(&api.request_local_user_transmission_mode(caller, mode))
    })
}

unsafe extern "C" fn request_user_move(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    channel: ChannelId,
    password: *const c_char,
) -> ErrorRaw {
    // A null password means "no password".
    let password = read_str(password);
    guarded("request_user_move", |api| {
        status_of(&api.request_user_move(caller, connection, user, channel, password))
    })
}

unsafe extern "C" fn request_microphone_activation_overwrite(
    caller: PluginId,
    activate: bool,
) -> ErrorRaw {
    guarded("request_microphone_activation_overwrite", |api| {
        status_of(&api.request_microphone_activation_overwrite(caller, activate))
    })
}

unsafe extern "C" fn request_local_mute(
    caller: PluginId,
    connection: ConnectionHandle,
    user: UserId,
    muted: bool,
) -> ErrorRaw {
    guarded("request_local_mute", |api| {
        status_of(&api.request_local_mute(caller, connection, user, muted))
    })
}

unsafe extern "C" fn request_local_user_mute(caller: PluginId, muted: bool) -> ErrorRaw {
    guarded("request_local_user_mute", |api| {
        status_of(&api.request_local_user_mute(caller, muted))
    })
}

unsafe extern "C" fn request_local_user_deaf(caller: PluginId, deafened: bool) -> ErrorRaw {
    guarded("request_local_user_deaf", |api| {
        status_of(&api.request_local_user_deaf(caller, deafened))
    })
}

unsafe extern "C" fn request_set_local_user_comment(
    caller: PluginId,
    connection: ConnectionHandle,
    comment: *const c_char,
) -> ErrorRaw {
    let Some(comment) = read_str(comment) else {
        return null_argument("request_set_local_user_comment", caller);
    };
    guarded("request_set_local_user_comment", |api| {
        status_of(&api.request_set_local_user_comment(caller, connection, comment))
    })
}

unsafe extern "C" fn find_user_by_name(
    caller: PluginId,
    connection: ConnectionHandle,
    name: *const c_char,
    user: *mut UserId,
) -> ErrorRaw {
    let Some(name) = read_str(name) else {
        return null_argument("find_user_by_name", caller);
    };
    if user.is_null() {
        return null_argument("find_user_by_name", caller);
    }
    guarded("find_user_by_name", |api| unsafe {
        write_out(user, api.find_user_by_name(caller, connection, name))
    })
}

unsafe extern "C" fn find_channel_by_name(
    caller: PluginId,
    connection: ConnectionHandle,
    name: *const c_char,
    channel: *mut ChannelId,
) -> ErrorRaw {
    let Some(name) = read_str(name) else {
        return null_argument("find_channel_by_name", caller);
    };
    if channel.is_null() {
        return null_argument("find_channel_by_name", caller);
    }
    guarded("find_channel_by_name", |api| unsafe {
        write_out(channel, api.find_channel_by_name(caller, connection, name))
    })
}

unsafe extern "C" fn get_setting_bool(caller: PluginId, key: i32, value: *mut bool) -> ErrorRaw {
    if value.is_null() {
        return null_argument("get_setting_bool", caller);
    }
    guarded("get_setting_bool", |api| unsafe {
        write_out(value, api.get_setting_bool(caller, SettingsKey::from_raw(key)))
    })
}

unsafe extern "C" fn get_setting_int(caller: PluginId, key: i32, value: *mut i64) -> ErrorRaw {
    if value.is_null() {
        return null_argument("get_setting_int", caller);
    }
    guarded("get_setting_int", |api| unsafe {
        write_out(value, api.get_setting_int(caller, SettingsKey::from_raw(key)))
    })
}

unsafe extern "C" fn get_setting_double(caller: PluginId, key: i32, value: *mut f64) -> ErrorRaw {
    if value.is_null() {
        return null_argument("get_setting_double", caller);
    }
    guarded("get_setting_double", |api| unsafe {
        write_out(value, api.get_setting_double(caller, SettingsKey::from_raw(key)))
    })
}

unsafe extern "C" fn get_setting_string(
    caller: PluginId,
    key: i32,
    value: *mut *const c_char,
) -> ErrorRaw {
    if value.is_null() {
        return null_argument("get_setting_string", caller);
    }
    guarded("get_setting_string", |api| unsafe {
        write_out(
            value,
            api.get_setting_string(caller, SettingsKey::from_raw(key))
                .map(|s| s.as_ptr()),
        )
    })
}

unsafe extern "C" fn set_setting_bool(caller: PluginId, key: i32, value: bool) -> ErrorRaw {
    guarded("set_setting_bool", |api| {
        status_of(&api.set_setting_bool(caller, SettingsKey::from_raw(key), value))
    })
}

unsafe extern "C" fn set_setting_int(caller: PluginId, key: i32, value: i64) -> ErrorRaw {
    guarded("set_setting_int", |api| {
        status_of(&api.set_setting_int(caller, SettingsKey::from_raw(key), value))
    })
}

unsafe extern "C" fn set_setting_double(caller: PluginId, key: i32, value: f64) -> ErrorRaw {
    guarded("set_setting_double", |api| {
        status_of(&api.set_setting_double(caller, SettingsKey::from_raw(key), value))
    })
}

unsafe extern "C" fn set_setting_string(
    caller: PluginId,
    key: i32,
    value: *const c_char,
) -> ErrorRaw {
    let Some(value) = read_str(value) else {
        return null_argument("set_setting_string", caller);
    };
    guarded("set_setting_string", |api| {
        status_of(&api.set_setting_string(caller, SettingsKey::from_raw(key), value))
    })
}

unsafe extern "C" fn send_data(
    caller: PluginId,
    connection: ConnectionHandle,
    users: *const UserId,
    user_count: usize,
    data: *const u8,
    data_length: usize,
    data_id: *const c_char,
) -> ErrorRaw {
    let (Some(receivers), Some(data), Some(data_id)) = (
        read_slice(users, user_count),
        read_slice(data, data_length),
        read_str(data_id),
    ) else {
        return null_argument("send_data", caller);
    };
    guarded("send_data", |api| {
        status_of(&api.send_data(caller, connection, receivers, data, data_id))
    })
}

unsafe extern "C" fn log(caller: PluginId, message: *const c_char) -> ErrorRaw {
    let Some(message) = read_str(message) else {
        return null_argument("log", caller);
    };
    guarded("log", |api| status_of(&api.log(caller, message)))
}

unsafe extern "C" fn play_sample_v1_0(caller: PluginId, path: *const c_char) -> ErrorRaw {
    let Some(path) = read_str(path) else {
        return null_argument("play_sample", caller);
    };
    guarded("play_sample", |api| status_of(&api.play_sample(caller, path)))
}

unsafe extern "C" fn play_sample_v1_2(
    caller: PluginId,
    path: *const c_char,
    volume: f32,
) -> ErrorRaw {
    let Some(path) = read_str(path) else {
        return null_argument("play_sample", caller);
    };
    guarded("play_sample", |api| {
        status_of(&api.play_sample_with_volume(caller, path, volume))
    })
}

macro_rules! api_table {
    (
        $(#[$meta:meta])*
        $name:ident, $ctor:ident, play_sample: $play_ty:ty = $play:expr
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy)]
        pub struct $name {
            pub free_memory: unsafe extern "C" fn(PluginId, *const c_void) -> ErrorRaw,
            pub get_active_server_connection:
                unsafe extern "C" fn(PluginId, *mut ConnectionHandle) -> ErrorRaw,
            pub is_connection_synchronized:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *mut bool) -> ErrorRaw,
            pub get_local_user_id: unsafe extern "C" fn(PluginId, ConnectionHandle, *mut UserId) -> ErrorRaw,
            pub get_user_name:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, *mut *const c_char) -> ErrorRaw,
            pub get_channel_name:
                unsafe extern "C" fn(PluginId, ConnectionHandle, ChannelId, *mut *const c_char) -> ErrorRaw,
            pub get_all_users:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *mut *mut UserId, *mut usize) -> ErrorRaw,
            pub get_all_channels: unsafe extern "C" fn(
                PluginId,
                ConnectionHandle,
                *mut *mut ChannelId,
                *mut usize,
            ) -> ErrorRaw,
            pub get_channel_of_user:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, *mut ChannelId) -> ErrorRaw,
            pub get_users_in_channel: unsafe extern "C" fn(
                PluginId,
                ConnectionHandle,
                ChannelId,
                *mut *mut UserId,
                *mut usize,
            ) -> ErrorRaw,
            pub get_local_user_transmission_mode: unsafe extern "C" fn(PluginId, *mut i32) -> ErrorRaw,
            pub is_user_locally_muted:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, *mut bool) -> ErrorRaw,
            pub is_local_user_muted: unsafe extern "C" fn(PluginId, *mut bool) -> ErrorRaw,
            pub is_local_user_deafened: unsafe extern "C" fn(PluginId, *mut bool) -> ErrorRaw,
            pub get_user_hash:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, *mut *const c_char) -> ErrorRaw,
            pub get_server_hash:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *mut *const c_char) -> ErrorRaw,
            pub get_user_comment:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, *mut *const c_char) -> ErrorRaw,
            pub get_channel_description:
                unsafe extern "C" fn(PluginId, ConnectionHandle, ChannelId, *mut *const c_char) -> ErrorRaw,
            pub request_local_user_transmission_mode: unsafe extern "C" fn(PluginId, i32) -> ErrorRaw,
            pub request_user_move: unsafe extern "C" fn(
                PluginId,
                ConnectionHandle,
                UserId,
                ChannelId,
                *const c_char,
            ) -> ErrorRaw,
            pub request_microphone_activation_overwrite: unsafe extern "C" fn(PluginId, bool) -> ErrorRaw,
            pub request_local_mute:
                unsafe extern "C" fn(PluginId, ConnectionHandle, UserId, bool) -> ErrorRaw,
            pub request_local_user_mute: unsafe extern "C" fn(PluginId, bool) -> ErrorRaw,
            pub request_local_user_deaf: unsafe extern "C" fn(PluginId, bool) -> ErrorRaw,
            pub request_set_local_user_comment:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *const c_char) -> ErrorRaw,
            pub find_user_by_name:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *const c_char, *mut UserId) -> ErrorRaw,
            pub find_channel_by_name:
                unsafe extern "C" fn(PluginId, ConnectionHandle, *const c_char, *mut ChannelId) -> ErrorRaw,
            pub get_setting_bool: unsafe extern "C" fn(PluginId, i32, *mut bool) -> ErrorRaw,
            pub get_setting_int: unsafe extern "C" fn(PluginId, i32, *mut i64) -> ErrorRaw,
            pub get_setting_double: unsafe extern "C" fn(PluginId, i32, *mut f64) -> ErrorRaw,
            pub get_setting_string: unsafe extern "C" fn(PluginId, i32, *mut *const c_char) -> ErrorRaw,
            pub set_setting_bool: unsafe extern "C" fn(PluginId, i32, bool) -> ErrorRaw,
            pub set_setting_int: unsafe extern "C" fn(PluginId, i32, i64) -> ErrorRaw,
            pub set_setting_double: unsafe extern "C" fn(PluginId, i32, f64) -> ErrorRaw,
            pub set_setting_string: unsafe extern "C" fn(PluginId, i32, *const c_char) -> ErrorRaw,
            pub send_data: unsafe extern "C" fn(
                PluginId,
                ConnectionHandle,
                *const UserId,
                usize,
                *const u8,
                usize,
                *const c_char,
            ) -> ErrorRaw,
            pub log: unsafe extern "C" fn(PluginId, *const c_char) -> ErrorRaw,
            pub play_sample: $play_ty,
        }

        pub fn $ctor() -> $name {
            $name {
                free_memory,
                get_active_server_connection,
                is_connection_synchronized,
                get_local_user_id,
                get_user_name,
                get_channel_name,
                get_all_users,
                get_all_channels,
                get_channel_of_user,
                get_users_in_channel,
                get_local_user_transmission_mode,
                is_user_locally_muted,
                is_local_user_muted,
                is_local_user_deafened,
                get_user_hash,
                get_server_hash,
                get_user_comment,
                get_channel_description,
                request_local_user_transmission_mode,
                request_user_move,
                request_microphone_activation_overwrite,
                request_local_mute,
                request_local_user_mute,
                request_local_user_deaf,
                request_set_local_user_comment,
                find_user_by_name,
                find_channel_by_name,
                get_setting_bool,
                get_setting_int,
                get_setting_double,
                get_setting_string,
                set_setting_bool,
                set_setting_int,
                set_setting_double,
                set_setting_string,
                send_data,
                log,
                play_sample: $play,
            }
        }
    };
}

api_table!(
    /// Function table for interface version 1.0.
    MumbleApiV1_0,
    api_table_v1_0,
    play_sample: unsafe extern "C" fn(PluginId, *const c_char) -> ErrorRaw = play_sample_v1_0
);

api_table!(
    /// Function table for interface version 1.2. Identical to 1.0 except
    /// for the volume argument of `play_sample`.
    MumbleApiV1_2,
    api_table_v1_2,
    play_sample: unsafe extern "C" fn(PluginId, *const c_char, f32) -> ErrorRaw = play_sample_v1_2
);

/// A table matching one interface version.
#[derive(Debug, Clone, Copy)]
pub enum ApiTable {
    V1_0(MumbleApiV1_0),
    V1_2(MumbleApiV1_2),
}

impl ApiTable {
    pub fn version(&self) -> Version {
        match self {
            Self::V1_0(_) => Version::new(1, 0, 0),
            Self::V1_2(_) => Version::new(1, 2, 0),
        }
    }
}

/// The table a plugin compiled against `version` expects.
pub fn api_table_for(version: Version) -> ApiResult<ApiTable> {
    match (version.major, version.minor) {
        (1, 0 | 1) => Ok(ApiTable::V1_0(api_table_v1_0())),
        (1, 2) => Ok(ApiTable::V1_2(api_table_v1_2())),
        _ => {
            tracing::warn!(%version, "Plugin requested an unknown API version");
            Err(ErrorCode::InvalidApiVersion)
        }
    }
}
