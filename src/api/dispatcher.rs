//! Promise-fulfilling implementations of every plugin API entry point.
//!
//! Each entry may be called from any thread. It packages its arguments into
//! a task for the host thread; the task locks the promise, gives up if the
//! caller already timed out, validates, does the work and stores exactly
//! one result. Entries never block on the host thread themselves.

use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::Arc;

use super::curator::ResourceCurator;
use super::error::{ApiResult, ErrorCode};
use super::executor::{HostHandle, HostState, HostTask};
use super::promise::ApiPromise;
use super::types::{
    ChannelId, ConnectionHandle, Lent, LentStr, PluginId, SettingValue, SettingsKey,
    TransmissionMode, UserId, MAX_DATA_ID_LENGTH, MAX_DATA_LENGTH,
    PLUGIN_DATA_MIN_SERVER_VERSION,
};
use crate::host::{BlobStore, HostContext, PluginDataTransmission, Session};

/// Entry points of the plugin API, bound to one host thread.
#[derive(Debug, Clone)]
pub struct PluginApi {
    host: HostHandle,
}

impl PluginApi {
    pub fn new(host: HostHandle) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    /// Run `body` on the host thread and deliver its result through
    /// `promise`, unless the caller cancelled first.
    fn dispatch<T, F>(&self, call: &'static str, promise: Arc<ApiPromise<T>>, body: F)
    where
        T: Send + 'static,
        F: FnOnce(&HostState) -> ApiResult<T> + Send + 'static,
    {
        let queued = Arc::clone(&promise);
        let task: HostTask = Box::new(move |state| {
            let guard = queued.lock();
            if guard.is_cancelled() {
                tracing::debug!(call, "Skipping API call cancelled by its caller");
                return;
            }
            let result = body(state);
            if let Err(code) = &result {
                tracing::debug!(call, error = %code, "API call failed");
            }
            guard.set_value(result);
        });

        if let Err(e) = self.host.execute(task) {
            tracing::warn!(call, error = %e, "Could not reach the host thread");
            promise.set_value(Err(ErrorCode::InternalError));
        }
    }

    /// Like [`dispatch`](Self::dispatch) for calls that only read the
    /// synchronized session.
    fn dispatch_synced<T, F>(
        &self,
        call: &'static str,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<T>>,
        body: F,
    ) where
        T: Send + 'static,
        F: FnOnce(SyncedCall<'_>) -> ApiResult<T> + Send + 'static,
    {
        self.dispatch(call, promise, move |state| {
            let context = &state.context;
            context.verify_plugin(caller)?;
            let (session, local_user) = context.synchronized(connection)?;
            body(SyncedCall {
                call,
                caller,
                context,
                session,
                local_user,
                curator: &state.curator,
            })
        });
    }

    /// Only the plugin id check, for table entries that must reject an
    /// argument before the real call is made.
    pub fn verify_caller_v1_0(&self, caller: PluginId, promise: Arc<ApiPromise<()>>) {
        self.dispatch("verify_caller", promise, move |state| {
            state.context.verify_plugin(caller)
        });
    }

    pub fn free_memory_v1_0(&self, caller: PluginId, address: usize, promise: Arc<ApiPromise<()>>) {
        // No plugin check: memory must be reclaimable even after the
        // plugin's id stopped being valid.
        self.dispatch("free_memory", promise, move |state| {
            state.curator.borrow_mut().release(address).inspect_err(|_| {
                tracing::warn!(plugin_id = caller, address, "Plugin freed unknown pointer");
            })
        });
    }

    pub fn get_active_server_connection_v1_0(
        &self,
        caller: PluginId,
        promise: Arc<ApiPromise<ConnectionHandle>>,
    ) {
        self.dispatch("get_active_server_connection", promise, move |state| {
            state.context.verify_plugin(caller)?;
            state
                .context
                .session()
                .map(Session::connection)
                .ok_or(ErrorCode::NoActiveConnection)
        });
    }

    pub fn is_connection_synchronized_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<bool>>,
    ) {
        self.dispatch("is_connection_synchronized", promise, move |state| {
            state.context.verify_plugin(caller)?;
            Ok(state.context.connection(connection)?.is_synchronized())
        });
    }

    pub fn get_local_user_id_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<UserId>>,
    ) {
        self.dispatch_synced("get_local_user_id", caller, connection, promise, |call| {
            Ok(call.local_user)
        });
    }

    pub fn get_user_name_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_user_name", caller, connection, promise, move |call| {
            let record = call.session.directory().user(user).ok_or(ErrorCode::UserNotFound)?;
            call.lend_str(&record.name)
        });
    }

    pub fn get_channel_name_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_channel_name", caller, connection, promise, move |call| {
            let record = call
                .session
                .directory()
                .channel(channel)
                .ok_or(ErrorCode::ChannelNotFound)?;
            call.lend_str(&record.name)
        });
    }

    pub fn get_all_users_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<Lent<UserId>>>,
    ) {
        self.dispatch_synced("get_all_users", caller, connection, promise, |call| {
            let ids = call.session.directory().user_ids();
            call.curator.borrow_mut().lend_user_ids(call.caller, call.call, ids)
        });
    }

    pub fn get_all_channels_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<Lent<ChannelId>>>,
    ) {
        self.dispatch_synced("get_all_channels", caller, connection, promise, |call| {
            let ids = call.session.directory().channel_ids();
            call.curator.borrow_mut().lend_channel_ids(call.caller, call.call, ids)
        });
    }

    pub fn get_channel_of_user_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        promise: Arc<ApiPromise<ChannelId>>,
    ) {
        self.dispatch_synced("get_channel_of_user", caller, connection, promise, move |call| {
            let record = call.session.directory().user(user).ok_or(ErrorCode::UserNotFound)?;
            record.channel.ok_or(ErrorCode::GenericError)
        });
    }

    pub fn get_users_in_channel_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
        promise: Arc<ApiPromise<Lent<UserId>>>,
    ) {
        self.dispatch_synced("get_users_in_channel", caller, connection, promise, move |call| {
            let members = call
                .session
                .directory()
                .users_in(channel)
                .ok_or(ErrorCode::ChannelNotFound)?;
            call.curator.borrow_mut().lend_user_ids(call.caller, call.call, members)
        });
    }

    pub fn get_local_user_transmission_mode_v1_0(
        &self,
        caller: PluginId,
        promise: Arc<ApiPromise<TransmissionMode>>,
    ) {
        self.dispatch("get_local_user_transmission_mode", promise, move |state| {
            state.context.verify_plugin(caller)?;
            Ok(state.context.settings().read().transmit)
        });
    }

    pub fn is_user_locally_muted_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        promise: Arc<ApiPromise<bool>>,
    ) {
        self.dispatch_synced("is_user_locally_muted", caller, connection, promise, move |call| {
            let record = call.session.directory().user(user).ok_or(ErrorCode::UserNotFound)?;
            Ok(record.local_mute)
        });
    }

    pub fn is_local_user_muted_v1_0(&self, caller: PluginId, promise: Arc<ApiPromise<bool>>) {
        self.dispatch("is_local_user_muted", promise, move |state| {
            state.context.verify_plugin(caller)?;
            Ok(state.context.settings().read().mute)
        });
    }

    pub fn is_local_user_deafened_v1_0(&self, caller: PluginId, promise: Arc<ApiPromise<bool>>) {
        self.dispatch("is_local_user_deafened", promise, move |state| {
            state.context.verify_plugin(caller)?;
            Ok(state.context.settings().read().deaf)
        });
    }

    pub fn get_user_hash_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_user_hash", caller, connection, promise, move |call| {
            let record = call.session.directory().user(user).ok_or(ErrorCode::UserNotFound)?;
            call.lend_str(&record.hash)
        });
    }

    pub fn get_server_hash_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_server_hash", caller, connection, promise, |call| {
            let digest = hex::encode(call.session.link().certificate_digest());
            call.lend_str(&digest)
        });
    }

    pub fn get_user_comment_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_user_comment", caller, connection, promise, move |call| {
            let directory = call.session.directory();
            let record = directory.user(user).ok_or(ErrorCode::UserNotFound)?;
            let comment = resolve_blob(&record.comment, &record.comment_hash, call.context.blobs())?;
            if let Cow::Owned(fetched) = &comment {
                directory.set_user_comment(user, fetched);
            }
            call.lend_str(&comment)
        });
    }

    pub fn get_channel_description_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        channel: ChannelId,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch_synced("get_channel_description", caller, connection, promise, move |call| {
            let directory = call.session.directory();
            let record = directory.channel(channel).ok_or(ErrorCode::ChannelNotFound)?;
            let description = resolve_blob(
                &record.description,
                &record.description_hash,
                call.context.blobs(),
            )?;
            if let Cow::Owned(fetched) = &description {
                directory.set_channel_description(channel, fetched);
            }
            call.lend_str(&description)
        });
    }

    pub fn request_local_user_transmission_mode_v1_0(
        &self,
        caller: PluginId,
        mode: i32,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("request_local_user_transmission_mode", promise, move |state| {
            let context = &state.context;
            context.verify_plugin(caller)?;
            let mode = TransmissionMode::from_raw(mode).ok_or(ErrorCode::UnknownTransmissionMode)?;
            let client = context.client().ok_or(ErrorCode::InternalError)?;
            client.set_transmission_mode(mode);
            context.settings().write().transmit = mode;
            tracing::debug!(plugin_id = caller, ?mode, "Plugin changed transmission mode");
            Ok(())
        });
    }

    pub fn request_user_move_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        channel: ChannelId,
        password: Option<String>,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch_synced("request_user_move", caller, connection, promise, move |call| {
            let directory = call.session.directory();
            let record = directory.user(user).ok_or(ErrorCode::UserNotFound)?;
            if directory.channel(channel).is_none() {
                return Err(ErrorCode::ChannelNotFound);
            }
            if record.channel != Some(channel) {
                let passwords: Vec<String> = password.into_iter().collect();
                call.session.link().join_channel(user, channel, &passwords);
            }
            Ok(())
        });
    }

    pub fn request_microphone_activation_overwrite_v1_0(
        &self,
        caller: PluginId,
        activate: bool,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("request_microphone_activation_overwrite", promise, move |state| {
            state.context.verify_plugin(caller)?;
            state.context.settings().write().microphone_overwrite = activate;
            Ok(())
        });
    }

    pub fn request_local_mute_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        user: UserId,
        muted: bool,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch_synced("request_local_mute", caller, connection, promise, move |call| {
            if user == call.local_user {
                return Err(ErrorCode::InvalidMuteTarget);
            }
            if call.session.directory().set_local_mute(user, muted) {
                Ok(())
            } else {
                Err(ErrorCode::UserNotFound)
            }
        });
    }

    pub fn request_local_user_mute_v1_0(
        &self,
        caller: PluginId,
        muted: bool,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("request_local_user_mute", promise, move |state| {
            let context = &state.context;
            context.verify_plugin(caller)?;
            context
                .client()
                .ok_or(ErrorCode::InternalError)?
                .set_audio_mute(muted);
            context.settings().write().mute = muted;
            Ok(())
        });
    }

    pub fn request_local_user_deaf_v1_0(
        &self,
        caller: PluginId,
        deafened: bool,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("request_local_user_deaf", promise, move |state| {
            let context = &state.context;
            context.verify_plugin(caller)?;
            context
                .client()
                .ok_or(ErrorCode::InternalError)?
                .set_audio_deaf(deafened);
            context.settings().write().deaf = deafened;
            Ok(())
        });
    }

    pub fn request_set_local_user_comment_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        comment: String,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch_synced("request_set_local_user_comment", caller, connection, promise, move |call| {
            let directory = call.session.directory();
            if directory.user(call.local_user).is_none() {
                return Err(ErrorCode::UserNotFound);
            }
            let client = call.context.client().ok_or(ErrorCode::InternalError)?;
            client.set_comment(call.local_user, &comment);
            directory.set_user_comment(call.local_user, &comment);
            Ok(())
        });
    }

    pub fn find_user_by_name_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
        promise: Arc<ApiPromise<UserId>>,
    ) {
        self.dispatch_synced("find_user_by_name", caller, connection, promise, move |call| {
            call.session
                .directory()
                .find_user(&name)
                .ok_or(ErrorCode::UserNotFound)
        });
    }

    pub fn find_channel_by_name_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        name: String,
        promise: Arc<ApiPromise<ChannelId>>,
    ) {
        self.dispatch_synced("find_channel_by_name", caller, connection, promise, move |call| {
            call.session
                .directory()
                .find_channel(&name)
                .ok_or(ErrorCode::ChannelNotFound)
        });
    }

    pub fn get_setting_bool_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        promise: Arc<ApiPromise<bool>>,
    ) {
        self.dispatch("get_setting_bool", promise, move |state| {
            match read_setting(&state.context, caller, key)? {
                SettingValue::Bool(value) => Ok(value),
                _ => Err(ErrorCode::WrongSettingsType),
            }
        });
    }

    pub fn get_setting_int_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        promise: Arc<ApiPromise<i64>>,
    ) {
        self.dispatch("get_setting_int", promise, move |state| {
            match read_setting(&state.context, caller, key)? {
                SettingValue::Int(value) => Ok(value),
                _ => Err(ErrorCode::WrongSettingsType),
            }
        });
    }

    pub fn get_setting_double_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        promise: Arc<ApiPromise<f64>>,
    ) {
        self.dispatch("get_setting_double", promise, move |state| {
            match read_setting(&state.context, caller, key)? {
                SettingValue::Double(value) => Ok(value),
                _ => Err(ErrorCode::WrongSettingsType),
            }
        });
    }

    pub fn get_setting_string_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        promise: Arc<ApiPromise<LentStr>>,
    ) {
        self.dispatch("get_setting_string", promise, move |state| {
            match read_setting(&state.context, caller, key)? {
                SettingValue::String(value) => {
                    state
                        .curator
                        .borrow_mut()
                        .lend_str(caller, "get_setting_string", &value)
                }
                _ => Err(ErrorCode::WrongSettingsType),
            }
        });
    }

    pub fn set_setting_bool_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: bool,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("set_setting_bool", promise, move |state| {
            write_setting(&state.context, caller, key, SettingValue::Bool(value))
        });
    }

    pub fn set_setting_int_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: i64,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("set_setting_int", promise, move |state| {
            write_setting(&state.context, caller, key, SettingValue::Int(value))
        });
    }

    pub fn set_setting_double_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: f64,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("set_setting_double", promise, move |state| {
            write_setting(&state.context, caller, key, SettingValue::Double(value))
        });
    }

    pub fn set_setting_string_v1_0(
        &self,
        caller: PluginId,
        key: SettingsKey,
        value: String,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("set_setting_string", promise, move |state| {
            write_setting(&state.context, caller, key, SettingValue::String(value))
        });
    }

    pub fn send_data_v1_0(
        &self,
        caller: PluginId,
        connection: ConnectionHandle,
        receivers: Vec<UserId>,
        data: Vec<u8>,
        data_id: String,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch_synced("send_data", caller, connection, promise, move |call| {
            if data.len() > MAX_DATA_LENGTH {
                return Err(ErrorCode::DataTooBig);
            }
            if data_id.len() > MAX_DATA_ID_LENGTH {
                return Err(ErrorCode::DataIdTooLong);
            }
            let directory = call.session.directory();
            if let Some(missing) = receivers.iter().find(|id| directory.user(**id).is_none()) {
                tracing::debug!(plugin_id = call.caller, user_id = missing, "Unknown data receiver");
                return Err(ErrorCode::UserNotFound);
            }
            let link = call.session.link();
            if link.server_version() < PLUGIN_DATA_MIN_SERVER_VERSION {
                return Err(ErrorCode::OperationUnsupportedByServer);
            }
            link.send_plugin_data(PluginDataTransmission {
                sender: call.local_user,
                receivers,
                data,
                data_id,
            });
            Ok(())
        });
    }

    pub fn log_v1_0(&self, caller: PluginId, message: String, promise: Arc<ApiPromise<()>>) {
        self.dispatch("log", promise, move |state| {
            let name = state
                .context
                .plugins()
                .name_of(caller)
                .ok_or(ErrorCode::InvalidPluginId)?;
            let line = format!("<b>{}:</b> {}", escape_html(&name), escape_html(&message));
            state.context.log().plugin_message(&line);
            Ok(())
        });
    }

    /// The 1.0 table has no volume argument; it plays at full volume.
    pub fn play_sample_v1_0(&self, caller: PluginId, path: String, promise: Arc<ApiPromise<()>>) {
        self.play_sample_v1_2(caller, path, 1.0, promise);
    }

    pub fn play_sample_v1_2(
        &self,
        caller: PluginId,
        path: String,
        volume: f32,
        promise: Arc<ApiPromise<()>>,
    ) {
        self.dispatch("play_sample", promise, move |state| {
            state.context.verify_plugin(caller)?;
            let audio = state.context.audio().ok_or(ErrorCode::AudioNotAvailable)?;
            if audio.play_sample(&path, volume) {
                Ok(())
            } else {
                Err(ErrorCode::InvalidSample)
            }
        });
    }
}

/// A validated call against the synchronized session.
struct SyncedCall<'a> {
    call: &'static str,
    caller: PluginId,
    context: &'a HostContext,
    session: &'a Session,
    local_user: UserId,
    curator: &'a RefCell<ResourceCurator>,
}

impl SyncedCall<'_> {
    fn lend_str(self, value: &str) -> ApiResult<LentStr> {
        self.curator
            .borrow_mut()
            .lend_str(self.caller, self.call, value)
    }
}

/// A cached text, or the blob it references when nothing is cached yet.
fn resolve_blob<'a>(cached: &'a str, hash: &[u8], blobs: &dyn BlobStore) -> ApiResult<Cow<'a, str>> {
    if !cached.is_empty() || hash.is_empty() {
        return Ok(Cow::Borrowed(cached));
    }
    match blobs.blob(hash) {
        Some(bytes) if !bytes.is_empty() => {
            Ok(Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()))
        }
        _ => Err(ErrorCode::UnsynchronizedBlob),
    }
}

fn read_setting(context: &HostContext, caller: PluginId, key: SettingsKey) -> ApiResult<SettingValue> {
    context.verify_plugin(caller)?;
    context
        .settings()
        .read()
        .get(key)
        .ok_or(ErrorCode::UnknownSettingsKey)
}

fn write_setting(
    context: &HostContext,
    caller: PluginId,
    key: SettingsKey,
    value: SettingValue,
) -> ApiResult<()> {
    context.verify_plugin(caller)?;
    let kind = value.kind();
    context.settings().write().set(key, value)?;
    tracing::debug!(plugin_id = caller, ?key, kind, "Plugin changed a setting");
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::executor::HostExecutor;
    use crate::api::sync_call::{call_sync, API_REQUEST_TIMEOUT};
    use crate::host::{
        AudioSettings, ChannelRecord, ClientRequest, Directory, MemoryBlobStore,
        PluginDirectory, PluginLog, RecordingControls, RecordingLink, UserRecord,
    };
    use crate::api::types::Version;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct Plugins;

    impl PluginDirectory for Plugins {
        fn contains(&self, id: PluginId) -> bool {
            id == 1
        }

        fn name_of(&self, id: PluginId) -> Option<String> {
            (id == 1).then(|| "<Tester>".into())
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl PluginLog for Lines {
        fn plugin_message(&self, html: &str) {
            self.0.lock().push(html.to_string());
        }
    }

    struct Fixture {
        executor: HostExecutor,
        api: PluginApi,
        link: Arc<RecordingLink>,
        lines: Arc<Lines>,
        controls: Arc<RecordingControls>,
        connection: ConnectionHandle,
    }

    fn user(session: UserId, name: &str, channel: Option<ChannelId>) -> UserRecord {
        UserRecord {
            session,
            name: name.into(),
            hash: format!("hash-{session}"),
            comment: String::new(),
            comment_hash: Vec::new(),
            channel,
            local_mute: false,
        }
    }

    fn fixture(server: Version) -> Fixture {
        build(server, false, true)
    }

    fn fixture_with_client(server: Version) -> Fixture {
        build(server, true, true)
    }

    fn build(server: Version, with_client: bool, synchronized: bool) -> Fixture {
        let directory = Arc::new(Directory::new());
        directory.upsert_channel(ChannelRecord {
            id: 0,
            name: "Root".into(),
            description: String::new(),
            description_hash: vec![9],
        });
        directory.upsert_user(user(1, "Me", Some(0)));
        directory.upsert_user(UserRecord {
            comment_hash: vec![7, 7],
            ..user(42, "Alice", None)
        });

        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert(vec![7, 7], b"hello & bye".to_vec());
        let lines = Arc::new(Lines::default());
        let link = Arc::new(RecordingLink::new(server, vec![0xde, 0xad]));

        let controls = Arc::new(RecordingControls::default());
        let mut context = HostContext::new(Arc::new(Plugins), AudioSettings::default())
            .with_blobs(blobs)
            .with_log(lines.clone());
        if with_client {
            context = context.with_client(controls.clone());
        }
        let connection = context.connect(link.clone(), directory);
        if synchronized {
            context.synchronize(1);
        }

        let executor = HostExecutor::spawn(context).unwrap();
        let api = PluginApi::new(executor.handle());
        Fixture {
            executor,
            api,
            link,
            lines,
            controls,
            connection,
        }
    }

    fn run<T: Send + 'static>(invoke: impl FnOnce(Arc<ApiPromise<T>>)) -> ApiResult<T> {
        let (promise, future) = ApiPromise::new();
        invoke(promise);
        assert!(future.wait_for(Duration::from_secs(5)));
        future.get()
    }

    #[test]
    fn unknown_plugin_is_rejected_before_anything_else() {
        let f = fixture(Version::new(1, 5, 0));
        let result = run(|p| f.api.get_user_name_v1_0(99, 12345, 42, p));
        assert_eq!(result, Err(ErrorCode::InvalidPluginId));
    }

    #[test]
    fn user_name_is_lent_and_freed() {
        let f = fixture(Version::new(1, 5, 0));
        let name = run(|p| f.api.get_user_name_v1_0(1, f.connection, 42, p)).unwrap();
        assert_eq!(unsafe { name.as_c_str() }.to_bytes_with_nul(), b"Alice\0");
        let address = name.as_ptr() as usize;
        assert_eq!(run(|p| f.api.free_memory_v1_0(1, address, p)), Ok(()));
        assert_eq!(
            run(|p| f.api.free_memory_v1_0(1, address, p)),
            Err(ErrorCode::PointerNotFound)
        );
        assert!(f.executor.shutdown().is_empty());
    }

    #[test]
    fn free_memory_skips_plugin_check() {
        let f = fixture(Version::new(1, 5, 0));
        let name = run(|p| f.api.get_server_hash_v1_0(1, f.connection, p)).unwrap();
        assert_eq!(unsafe { name.as_c_str() }.to_str().unwrap(), "dead");
        let address = name.as_ptr() as usize;
        assert_eq!(run(|p| f.api.free_memory_v1_0(77, address, p)), Ok(()));
    }

    #[test]
    fn wrong_connection_is_not_found() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.get_local_user_id_v1_0(1, f.connection + 1, p)),
            Err(ErrorCode::ConnectionNotFound)
        );
        assert_eq!(run(|p| f.api.get_local_user_id_v1_0(1, f.connection, p)), Ok(1));
    }

    #[test]
    fn channel_of_user_without_channel_is_generic_error() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.get_channel_of_user_v1_0(1, f.connection, 42, p)),
            Err(ErrorCode::GenericError)
        );
        assert_eq!(run(|p| f.api.get_channel_of_user_v1_0(1, f.connection, 1, p)), Ok(0));
    }

    #[test]
    fn comment_blob_is_fetched_lazily() {
        let f = fixture(Version::new(1, 5, 0));
        let comment = run(|p| f.api.get_user_comment_v1_0(1, f.connection, 42, p)).unwrap();
        assert_eq!(unsafe { comment.as_c_str() }.to_str().unwrap(), "hello & bye");
        assert_eq!(
            run(|p| f.api.get_channel_description_v1_0(1, f.connection, 0, p)),
            Err(ErrorCode::UnsynchronizedBlob)
        );
    }

    #[test]
    fn muting_yourself_is_refused() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.request_local_mute_v1_0(1, f.connection, 1, true, p)),
            Err(ErrorCode::InvalidMuteTarget)
        );
        assert_eq!(run(|p| f.api.request_local_mute_v1_0(1, f.connection, 42, true, p)), Ok(()));
        assert_eq!(run(|p| f.api.is_user_locally_muted_v1_0(1, f.connection, 42, p)), Ok(true));
    }

    #[test]
    fn move_only_sends_join_when_needed() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(run(|p| f.api.request_user_move_v1_0(1, f.connection, 1, 0, None, p)), Ok(()));
        assert!(f.link.joins().is_empty());
        assert_eq!(
            run(|p| f.api.request_user_move_v1_0(1, f.connection, 42, 0, Some("pw".into()), p)),
            Ok(())
        );
        assert_eq!(f.link.joins(), vec![(42, 0, vec!["pw".to_string()])]);
        assert_eq!(
            run(|p| f.api.request_user_move_v1_0(1, f.connection, 42, 5, None, p)),
            Err(ErrorCode::ChannelNotFound)
        );
    }

    #[test]
    fn send_data_limits() {
        let f = fixture(Version::new(1, 5, 0));
        let too_big = vec![0u8; MAX_DATA_LENGTH + 1];
        assert_eq!(
            run(|p| f.api.send_data_v1_0(1, f.connection, vec![42], too_big, "id".into(), p)),
            Err(ErrorCode::DataTooBig)
        );
        let long_id = "x".repeat(MAX_DATA_ID_LENGTH + 1);
        assert_eq!(
            run(|p| f.api.send_data_v1_0(1, f.connection, vec![42], vec![1], long_id, p)),
            Err(ErrorCode::DataIdTooLong)
        );
        assert_eq!(
            run(|p| f.api.send_data_v1_0(1, f.connection, vec![42, 5], vec![1], "id".into(), p)),
            Err(ErrorCode::UserNotFound)
        );
        let exact = vec![0u8; MAX_DATA_LENGTH];
        assert_eq!(
            run(|p| f.api.send_data_v1_0(1, f.connection, vec![42], exact, "id".into(), p)),
            Ok(())
        );
        let sent = f.link.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender, 1);
    }

    #[test]
    fn send_data_needs_recent_server() {
        let f = fixture(Version::new(1, 3, 0));
        assert_eq!(
            run(|p| f.api.send_data_v1_0(1, f.connection, vec![42], vec![1], "id".into(), p)),
            Err(ErrorCode::OperationUnsupportedByServer)
        );
    }

    #[test]
    fn log_escapes_name_and_message() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(run(|p| f.api.log_v1_0(1, "a<b".into(), p)), Ok(()));
        assert_eq!(f.lines.0.lock().as_slice(), ["<b>&lt;Tester&gt;:</b> a&lt;b"]);
        assert_eq!(run(|p| f.api.log_v1_0(2, "x".into(), p)), Err(ErrorCode::InvalidPluginId));
    }

    #[test]
    fn missing_collaborators_map_to_codes() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.play_sample_v1_0(1, "/tmp/x.ogg".into(), p)),
            Err(ErrorCode::AudioNotAvailable)
        );
        assert_eq!(
            run(|p| f.api.request_local_user_mute_v1_0(1, true, p)),
            Err(ErrorCode::InternalError)
        );
        assert_eq!(
            run(|p| f.api.request_local_user_transmission_mode_v1_0(1, 7, p)),
            Err(ErrorCode::UnknownTransmissionMode)
        );
    }

    #[test]
    fn settings_round_trip_through_the_host() {
        let f = fixture(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.set_setting_int_v1_0(1, SettingsKey::VoiceHold, 80, p)),
            Ok(())
        );
        assert_eq!(run(|p| f.api.get_setting_int_v1_0(1, SettingsKey::VoiceHold, p)), Ok(80));
        assert_eq!(
            run(|p| f.api.get_setting_bool_v1_0(1, SettingsKey::VoiceHold, p)),
            Err(ErrorCode::WrongSettingsType)
        );
        assert_eq!(
            run(|p| f.api.get_setting_double_v1_0(1, SettingsKey::Invalid, p)),
            Err(ErrorCode::UnknownSettingsKey)
        );
    }

    #[test]
    fn bool_and_string_settings_reject_numeric_keys() {
        let f = fixture(Version::new(1, 5, 0));
        for key in [
            SettingsKey::VoiceHold,
            SettingsKey::VadSilenceThreshold,
            SettingsKey::PositionalBloom,
        ] {
            assert_eq!(
                run(|p| f.api.get_setting_bool_v1_0(1, key, p)),
                Err(ErrorCode::WrongSettingsType)
            );
            assert_eq!(
                run(|p| f.api.get_setting_string_v1_0(1, key, p)).err(),
                Some(ErrorCode::WrongSettingsType)
            );
            assert_eq!(
                run(|p| f.api.set_setting_bool_v1_0(1, key, true, p)),
                Err(ErrorCode::WrongSettingsType)
            );
            assert_eq!(
                run(|p| f.api.set_setting_string_v1_0(1, key, "loud".into(), p)),
                Err(ErrorCode::WrongSettingsType)
            );
        }
        assert_eq!(
            run(|p| f.api.get_setting_bool_v1_0(1, SettingsKey::Invalid, p)),
            Err(ErrorCode::UnknownSettingsKey)
        );
        assert_eq!(
            run(|p| f.api.get_setting_string_v1_0(1, SettingsKey::Invalid, p)).err(),
            Some(ErrorCode::UnknownSettingsKey)
        );
        assert_eq!(
            run(|p| f.api.get_setting_string_v1_0(9, SettingsKey::VoiceHold, p)).err(),
            Some(ErrorCode::InvalidPluginId)
        );
        // Nothing was lent along the way.
        assert!(f.executor.shutdown().is_empty());
    }

    #[test]
    fn client_requests_are_visible_to_later_reads() {
        let f = fixture_with_client(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.request_local_user_transmission_mode_v1_0(1, 2, p)),
            Ok(())
        );
        assert_eq!(
            run(|p| f.api.get_local_user_transmission_mode_v1_0(1, p)),
            Ok(TransmissionMode::PushToTalk)
        );
        assert_eq!(run(|p| f.api.is_local_user_muted_v1_0(1, p)), Ok(false));
        assert_eq!(run(|p| f.api.request_local_user_mute_v1_0(1, true, p)), Ok(()));
        assert_eq!(run(|p| f.api.is_local_user_muted_v1_0(1, p)), Ok(true));
        assert_eq!(run(|p| f.api.request_local_user_deaf_v1_0(1, true, p)), Ok(()));
        assert_eq!(run(|p| f.api.is_local_user_deafened_v1_0(1, p)), Ok(true));
        assert_eq!(
            f.controls.requests(),
            vec![
                ClientRequest::TransmissionMode(TransmissionMode::PushToTalk),
                ClientRequest::Mute(true),
                ClientRequest::Deaf(true),
            ]
        );

        assert_eq!(
            run(|p| f.api.request_microphone_activation_overwrite_v1_0(1, true, p)),
            Ok(())
        );
        let overwrite = f
            .api
            .host()
            .query(|state| state.context.settings().read().microphone_overwrite)
            .unwrap();
        assert!(overwrite);
    }

    #[test]
    fn local_comment_goes_to_client_and_cache() {
        let f = fixture_with_client(Version::new(1, 5, 0));
        assert_eq!(
            run(|p| f.api.request_set_local_user_comment_v1_0(1, f.connection, "afk".into(), p)),
            Ok(())
        );
        assert_eq!(
            f.controls.requests(),
            vec![ClientRequest::Comment(1, "afk".into())]
        );
        let comment = run(|p| f.api.get_user_comment_v1_0(1, f.connection, 1, p)).unwrap();
        assert_eq!(unsafe { comment.as_c_str() }.to_str().unwrap(), "afk");
        let address = comment.as_ptr() as usize;
        assert_eq!(run(|p| f.api.free_memory_v1_0(1, address, p)), Ok(()));
    }

    #[test]
    fn local_comment_needs_synchronized_session() {
        let f = build(Version::new(1, 5, 0), true, false);
        assert_eq!(
            run(|p| f.api.request_set_local_user_comment_v1_0(1, f.connection, "afk".into(), p)),
            Err(ErrorCode::ConnectionUnsynchronized)
        );
        assert!(f.controls.requests().is_empty());
    }

    #[test]
    fn blocking_calls_from_host_tasks_run_inline() {
        let f = fixture(Version::new(1, 5, 0));
        let api = f.api.clone();
        let connection = f.connection;
        let started = Instant::now();
        let (local, name) = f
            .api
            .host()
            .query(move |_| {
                let local = call_sync(|p| api.get_local_user_id_v1_0(1, connection, p));
                let name = call_sync(|p| api.get_user_name_v1_0(1, connection, 42, p)).map(
                    |name| {
                        let text = unsafe { name.as_c_str() }.to_string_lossy().into_owned();
                        let freed = call_sync(|p| {
                            api.free_memory_v1_0(1, name.as_ptr() as usize, p)
                        });
                        (text, freed)
                    },
                );
                (local, name)
            })
            .unwrap();
        assert!(started.elapsed() < API_REQUEST_TIMEOUT);
        assert_eq!(local, Ok(1));
        assert_eq!(name, Ok(("Alice".to_string(), Ok(()))));
        assert!(f.executor.shutdown().is_empty());
    }

    #[test]
    fn cancelled_promise_is_left_untouched() {
        let f = fixture(Version::new(1, 5, 0));
        let (promise, future) = ApiPromise::new();
        promise.cancel();
        f.api.get_all_users_v1_0(1, f.connection, promise);
        // Anything queued after the cancelled call has run once this returns.
        f.api.host().query(|_| ()).unwrap();
        assert!(!future.is_ready());
        assert!(f.executor.shutdown().is_empty());
    }

    #[test]
    fn escape_html_covers_markup() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
