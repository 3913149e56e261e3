//! Everything an API call may read or change, owned by the host thread.

use parking_lot::RwLock;
use std::sync::Arc;

use super::directory::Directory;
use super::services::{
    AudioOutput, BlobStore, ClientControls, MemoryBlobStore, PluginDirectory, PluginLog,
    ServerLink, TracingLog,
};
use super::settings::AudioSettings;
use crate::api::error::{ApiResult, ErrorCode};
use crate::api::types::{ConnectionHandle, PluginId, UserId};

/// The active server connection.
pub struct Session {
    connection: ConnectionHandle,
    link: Arc<dyn ServerLink>,
    directory: Arc<Directory>,
    local_user: Option<UserId>,
}

impl Session {
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    pub fn link(&self) -> &dyn ServerLink {
        self.link.as_ref()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// The local user's session id, known once the server finished syncing.
    pub fn local_user(&self) -> Option<UserId> {
        self.local_user
    }

    pub fn is_synchronized(&self) -> bool {
        self.local_user.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("local_user", &self.local_user)
            .finish_non_exhaustive()
    }
}

pub struct HostContext {
    plugins: Arc<dyn PluginDirectory>,
    settings: Arc<RwLock<AudioSettings>>,
    blobs: Arc<dyn BlobStore>,
    log: Arc<dyn PluginLog>,
    client: Option<Arc<dyn ClientControls>>,
    audio: Option<Arc<dyn AudioOutput>>,
    session: Option<Session>,
    next_connection: ConnectionHandle,
}

impl HostContext {
    pub fn new(plugins: Arc<dyn PluginDirectory>, settings: AudioSettings) -> Self {
        Self {
            plugins,
            settings: Arc::new(RwLock::new(settings)),
            blobs: Arc::new(MemoryBlobStore::new()),
            log: Arc::new(TracingLog),
            client: None,
            audio: None,
            session: None,
            next_connection: 0,
        }
    }

    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn PluginLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ClientControls>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioOutput>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Open a new session and return its connection handle. Any previous
    /// session is replaced.
    pub fn connect(&mut self, link: Arc<dyn ServerLink>, directory: Arc<Directory>) -> ConnectionHandle {
        let connection = self.next_connection;
        self.next_connection = self.next_connection.wrapping_add(1).max(0);
        if let Some(previous) = self.session.take() {
            tracing::info!(connection = previous.connection, "Replacing server session");
        }
        self.session = Some(Session {
            connection,
            link,
            directory,
            local_user: None,
        });
        tracing::info!(connection, "Server session opened");
        connection
    }

    /// Mark the session synchronized with `local_user` as our own session id.
    pub fn synchronize(&mut self, local_user: UserId) -> bool {
        match self.session.as_mut() {
            Some(session) => {
                session.local_user = Some(local_user);
                tracing::info!(connection = session.connection, local_user, "Server session synchronized");
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn plugins(&self) -> &dyn PluginDirectory {
        self.plugins.as_ref()
    }

    /// Shared with the audio pipeline, which reads it without going through
    /// the host thread.
    pub fn settings(&self) -> Arc<RwLock<AudioSettings>> {
        Arc::clone(&self.settings)
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub fn log(&self) -> &dyn PluginLog {
        self.log.as_ref()
    }

    pub fn client(&self) -> Option<&dyn ClientControls> {
        self.client.as_deref()
    }

    pub fn audio(&self) -> Option<&dyn AudioOutput> {
        self.audio.as_deref()
    }

    pub fn verify_plugin(&self, plugin: PluginId) -> ApiResult<()> {
        if self.plugins.contains(plugin) {
            Ok(())
        } else {
            Err(ErrorCode::InvalidPluginId)
        }
    }

    /// The session behind `connection`.
    pub fn connection(&self, connection: ConnectionHandle) -> ApiResult<&Session> {
        self.session
            .as_ref()
            .filter(|session| session.connection == connection)
            .ok_or(ErrorCode::ConnectionNotFound)
    }

    /// The session behind `connection`, which must be synchronized, with
    /// the local user's id.
    pub fn synchronized(&self, connection: ConnectionHandle) -> ApiResult<(&Session, UserId)> {
        let session = self.connection(connection)?;
        let local = session
            .local_user
            .ok_or(ErrorCode::ConnectionUnsynchronized)?;
        Ok((session, local))
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("session", &self.session)
            .field("client", &self.client.is_some())
            .field("audio", &self.audio.is_some())
            .finish_non_exhaustive()
    }
}
