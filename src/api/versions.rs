//! Versioned, blocking views of the plugin API.
//!
//! Each interface version is a trait; a newer version extends the older one
//! and only adds capabilities. [`PluginApi`] implements every version by
//! wrapping its promise-based entries in [`call_sync`].

use std::ffi::c_char;

use super::dispatcher::PluginApi;
use super::error::ApiResult;
use super::sync_call::call_sync;
use super::types::{
    ChannelId, ConnectionHandle, Lent, LentStr, PluginId, SettingsKey, TransmissionMode, UserId,
};

/// Interface version 1.0.
pub trait ApiV1_0 {
    fn free_memory(&self, caller: PluginId, address: usize) -> ApiResult<()>;
    fn get_active_server_connection(&self, caller: PluginId) -> ApiResult<ConnectionHandle>;
    fn is_connection_synchronized(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<bool>;
    fn get_local_user_id(&self, caller: PluginId, connection: ConnectionHandle)
        -> ApiResult<UserId>;
    fn get_user_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr>;
    fn get_channel_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<LentStr>;
    fn get_all_users(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<Lent<UserId>>;
    fn get_all_channels(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<Lent<ChannelId>>;
    fn get_channel_of_user(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<ChannelId>;
    fn get_users_in_channel(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<Lent<UserId>>;
    fn get_local_user_transmission_mode(&self, caller: PluginId) -> ApiResult<TransmissionMode>;
    fn is_user_locally_muted(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<bool>;
    fn is_local_user_muted(&self, caller: PluginId) -> ApiResult<bool>;
    fn is_local_user_deafened(&self, caller: PluginId) -> ApiResult<bool>;
    fn get_user_hash(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr>;
    fn get_server_hash(&self, caller: PluginId, connection: ConnectionHandle)
        -> ApiResult<LentStr>;
    fn get_user_comment(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr>;
    fn get_channel_description(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<LentStr>;
    /// `mode` is the raw value; unknown values are rejected by the host.
    fn request_local_user_transmission_mode(&self, caller: PluginId, mode: i32) -> ApiResult<()>;
    fn request_user_move(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        channel: ChannelId,
        password: Option<String>,
    ) -> ApiResult<()>;
    fn request_microphone_activation_overwrite(
        &self,
        caller: PluginId,
        activate: bool,
    ) -> ApiResult<()>;
    fn request_local_mute(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        muted: bool,
    ) -> ApiResult<()>;
    fn request_local_user_mute(&self, caller: PluginId, muted: bool) -> ApiResult<()>;
    fn request_local_user_deaf(&self, caller: PluginId, deafened: bool) -> ApiResult<()>;
    fn request_set_local_user_comment(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        comment: String,
    ) -> ApiResult<()>;
    fn find_user_by_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
    ) -> ApiResult<UserId>;
    fn find_channel_by_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
    ) -> ApiResult<ChannelId>;
    fn get_setting_bool(&self, caller: PluginId, key: SettingsKey) -> ApiResult<bool>;
    fn get_setting_int(&self, caller: PluginId, key: SettingsKey) -> ApiResult<i64>;
    fn get_setting_double(&self, caller: PluginId, key: SettingsKey) -> ApiResult<f64>;
    fn get_setting_string(&self, caller: PluginId, key: SettingsKey) -> ApiResult<Lent<c_char>>;
    fn set_setting_bool(&self, caller: PluginId, key: SettingsKey, value: bool) -> ApiResult<()>;
    fn set_setting_int(&self, caller: PluginId, key: SettingsKey, value: i64) -> ApiResult<()>;
    fn set_setting_double(&self, caller: PluginId, key: SettingsKey, value: f64)
        -> ApiResult<()>;
    fn set_setting_string(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: String,
    ) -> ApiResult<()>;
    fn send_data(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        receivers: Vec<UserId>,
        data: Vec<u8>,
        data_id: String,
    ) -> ApiResult<()>;
    fn log(&self, caller: PluginId, message: String) -> ApiResult<()>;
    /// Plays at full volume.
    fn play_sample(&self, caller: PluginId, path: String) -> ApiResult<()>;
}

/// Interface version 1.2: adds a volume to sample playback.
pub trait ApiV1_2: ApiV1_0 {
    fn play_sample_with_volume(&self, caller: PluginId, path: String, volume: f32)
        -> ApiResult<()>;
}

impl ApiV1_0 for PluginApi {
    fn free_memory(&self, caller: PluginId, address: usize) -> ApiResult<()> {
        call_sync(|p| self.free_memory_v1_0(caller, address, p))
    }

    fn get_active_server_connection(&self, caller: PluginId) -> ApiResult<ConnectionHandle> {
        call_sync(|p| self.get_active_server_connection_v1_0(caller, p))
    }

    fn is_connection_synchronized(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<bool> {
        call_sync(|p| self.is_connection_synchronized_v1_0(caller, connection, p))
    }

    fn get_local_user_id(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<UserId> {
        call_sync(|p| self.get_local_user_id_v1_0(caller, connection, p))
    }

    fn get_user_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_user_name_v1_0(caller, connection, user, p))
    }

    fn get_channel_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_channel_name_v1_0(caller, connection, channel, p))
    }

    fn get_all_users(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<Lent<UserId>> {
        call_sync(|p| self.get_all_users_v1_0(caller, connection, p))
    }

    fn get_all_channels(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<Lent<ChannelId>> {
        call_sync(|p| self.get_all_channels_v1_0(caller, connection, p))
    }

    fn get_channel_of_user(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<ChannelId> {
        call_sync(|p| self.get_channel_of_user_v1_0(caller, connection, user, p))
    }

    fn get_users_in_channel(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<Lent<UserId>> {
        call_sync(|p| self.get_users_in_channel_v1_0(caller, connection, channel, p))
    }

    fn get_local_user_transmission_mode(&self, caller: PluginId) -> ApiResult<TransmissionMode> {
        call_sync(|p| self.get_local_user_transmission_mode_v1_0(caller, p))
    }

    fn is_user_locally_muted(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<bool> {
        call_sync(|p| self.is_user_locally_muted_v1_0(caller, connection, user, p))
    }

    fn is_local_user_muted(&self, caller: PluginId) -> ApiResult<bool> {
        call_sync(|p| self.is_local_user_muted_v1_0(caller, p))
    }

    fn is_local_user_deafened(&self, caller: PluginId) -> ApiResult<bool> {
        call_sync(|p| self.is_local_user_deafened_v1_0(caller, p))
    }

    fn get_user_hash(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_user_hash_v1_0(caller, connection, user, p))
    }

    fn get_server_hash(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_server_hash_v1_0(caller, connection, p))
    }

    fn get_user_comment(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_user_comment_v1_0(caller, connection, user, p))
    }

    fn get_channel_description(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
    ) -> ApiResult<LentStr> {
        call_sync(|p| self.get_channel_description_v1_0(caller, connection, channel, p))
    }

    fn request_local_user_transmission_mode(&self, caller: PluginId, mode: i32) -> ApiResult<()> {
        call_sync(|p| self.request_local_user_transmission_mode_v1_0(caller, mode, p))
    }

    fn request_user_move(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        channel: ChannelId,
        password: Option<String>,
    ) -> ApiResult<()> {
        call_sync(|p| self.request_user_move_v1_0(caller, connection, user, channel, password, p))
    }

    fn request_microphone_activation_overwrite(
        &self,
        caller: PluginId,
        activate: bool,
    ) -> ApiResult<()> {
        call_sync(|p| self.request_microphone_activation_overwrite_v1_0(caller, activate, p))
    }

    fn request_local_mute(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        muted: bool,
    ) -> ApiResult<()> {
        call_sync(|p| self.request_local_mute_v1_0(caller, connection, user, muted, p))
    }

    fn request_local_user_mute(&self, caller: PluginId, muted: bool) -> ApiResult<()> {
        call_sync(|p| self.request_local_user_mute_v1_0(caller, muted, p))
    }

    fn request_local_user_deaf(&self, caller: PluginId, deafened: bool) -> ApiResult<()> {
        call_sync(|p| self.request_local_user_deaf_v1_0(caller, deafened, p))
    }

    fn request_set_local_user_comment(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        comment: String,
    ) -> ApiResult<()> {
        call_sync(|p| self.request_set_local_user_comment_v1_0(caller, connection, comment, p))
    }

    fn find_user_by_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
    ) -> ApiResult<UserId> {
        call_sync(|p| self.find_user_by_name_v1_0(caller, connection, name, p))
    }

    fn find_channel_by_name(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
    ) -> ApiResult<ChannelId> {
        call_sync(|p| self.find_channel_by_name_v1_0(caller, connection, name, p))
    }

    fn get_setting_bool(&self, caller: PluginId, key: SettingsKey) -> ApiResult<bool> {
        call_sync(|p| self.get_setting_bool_v1_0(caller, key, p))
    }

    fn get_setting_int(&self, caller: PluginId, key: SettingsKey) -> ApiResult<i64> {
        call_sync(|p| self.get_setting_int_v1_0(caller, key, p))
    }

    fn get_setting_double(&self, caller: PluginId, key: SettingsKey) -> ApiResult<f64> {
        call_sync(|p| self.get_setting_double_v1_0(caller, key, p))
    }

    fn get_setting_string(&self, caller: PluginId, key: SettingsKey) -> ApiResult<Lent<c_char>> {
        call_sync(|p| self.get_setting_string_v1_0(caller, key, p))
    }

    fn set_setting_bool(&self, caller: PluginId, key: SettingsKey, value: bool) -> ApiResult<()> {
        call_sync(|p| self.set_setting_bool_v1_0(caller, key, value, p))
    }

    fn set_setting_int(&self, caller: PluginId, key: SettingsKey, value: i64) -> ApiResult<()> {
        call_sync(|p| self.set_setting_int_v1_0(caller, key, value, p))
    }

    fn set_setting_double(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: f64,
    ) -> ApiResult<()> {
        call_sync(|p| self.set_setting_double_v1_0(caller, key, value, p))
    }

    fn set_setting_string(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: String,
    ) -> ApiResult<()> {
        call_sync(|p| self.set_setting_string_v1_0(caller, key, value, p))
    }

    fn send_data(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        receivers: Vec<UserId>,
        data: Vec<u8>,
        data_id: String,
    ) -> ApiResult<()> {
        call_sync(|p| self.send_data_v1_0(caller, connection, receivers, data, data_id, p))
    }

    fn log(&self, caller: PluginId, message: String) -> ApiResult<()> {
        call_sync(|p| self.log_v1_0(caller, message, p))
    }

    fn play_sample(&self, caller: PluginId, path: String) -> ApiResult<()> {
        call_sync(|p| self.play_sample_v1_0(caller, path, p))
    }
}

impl ApiV1_2 for PluginApi {
    fn play_sample_with_volume(
        &self,
        caller: PluginId,
        path: String,
        volume: f32,
    ) -> ApiResult<()> {
        call_sync(|p| self.play_sample_v1_2(caller, path, volume, p))
    }
}
