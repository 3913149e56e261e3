//! In-memory user and channel directory for the active session.
//!
//! Readers take the lock only for the duration of a lookup and get owned
//! copies back, so no lock is ever held across an API call.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::types::{ChannelId, UserId};

/// A user as known to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Session id assigned by the server
    pub session: UserId,
    /// Display name
    pub name: String,
    /// Certificate hash (hex)
    #[serde(default)]
    pub hash: String,
    /// Cached comment; empty until synchronized or when there is none
    #[serde(default)]
    pub comment: String,
    /// Hash of the comment blob when the server only sent a reference
    #[serde(default)]
    pub comment_hash: Vec<u8>,
    /// Channel the user is currently in
    #[serde(default)]
    pub channel: Option<ChannelId>,
    /// Whether this client muted the user locally
    #[serde(default)]
    pub local_mute: bool,
}

/// A channel as known to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_hash: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Directory {
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    channels: RwLock<BTreeMap<ChannelId, ChannelRecord>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&self, user: UserRecord) {
        self.users.write().insert(user.session, user);
    }

    pub fn upsert_channel(&self, channel: ChannelRecord) {
        self.channels.write().insert(channel.id, channel);
    }

    pub fn user(&self, id: UserId) -> Option<UserRecord> {
        self.users.read().get(&id).cloned()
    }

    pub fn channel(&self, id: ChannelId) -> Option<ChannelRecord> {
        self.channels.read().get(&id).cloned()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.users.read().keys().copied().collect()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.read().keys().copied().collect()
    }

    /// First user whose name matches exactly.
    pub fn find_user(&self, name: &str) -> Option<UserId> {
        self.users
            .read()
            .values()
            .find(|user| user.name == name)
            .map(|user| user.session)
    }

    pub fn find_channel(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .read()
            .values()
            .find(|channel| channel.name == name)
            .map(|channel| channel.id)
    }

    /// Members of a channel, or `None` if the channel is unknown.
    pub fn users_in(&self, channel: ChannelId) -> Option<Vec<UserId>> {
        if !self.channels.read().contains_key(&channel) {
            return None;
        }
        Some(
            self.users
                .read()
                .values()
                .filter(|user| user.channel == Some(channel))
                .map(|user| user.session)
                .collect(),
        )
    }

    pub fn set_local_mute(&self, user: UserId, muted: bool) -> bool {
        self.update_user(user, |record| record.local_mute = muted)
    }

    pub fn set_user_comment(&self, user: UserId, comment: &str) -> bool {
        self.update_user(user, |record| record.comment = comment.to_string())
    }

    pub fn set_channel_description(&self, channel: ChannelId, description: &str) -> bool {
        match self.channels.write().get_mut(&channel) {
            Some(record) => {
                record.description = description.to_string();
                true
            }
            None => false,
        }
    }

    fn update_user(&self, user: UserId, apply: impl FnOnce(&mut UserRecord)) -> bool {
        match self.users.write().get_mut(&user) {
            Some(record) => {
                apply(record);
                true
            }
            None => false,
        }
    }
}
