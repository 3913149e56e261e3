//! Offline session description used by `voxlink probe`.
//!
//! ```toml
//! server_version = { major = 1, minor = 5, patch = 0 }
//! certificate_digest = "a1b2c3"
//! local_user = 1
//!
//! [[channels]]
//! id = 0
//! name = "Root"
//!
//! [[users]]
//! session = 1
//! name = "Alice"
//! channel = 0
//!
//! [[blobs]]
//! hash = "0102"
//! content = "Hello from a blob"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::directory::{ChannelRecord, Directory, UserRecord};
use super::services::{MemoryBlobStore, RecordingLink};
use crate::api::types::{UserId, Version};

#[derive(Debug, Clone, Deserialize)]
pub struct BlobEntry {
    /// Hex encoded hash
    pub hash: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSnapshot {
    pub server_version: Version,
    /// Hex encoded certificate digest
    #[serde(default)]
    pub certificate_digest: String,
    #[serde(default)]
    pub local_user: Option<UserId>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub blobs: Vec<BlobEntry>,
}

impl SessionSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid session file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn directory(&self) -> Directory {
        let directory = Directory::new();
        for channel in &self.channels {
            directory.upsert_channel(channel.clone());
        }
        for user in &self.users {
            directory.upsert_user(user.clone());
        }
        directory
    }

    pub fn link(&self) -> Result<RecordingLink> {
        let digest = hex::decode(&self.certificate_digest)
            .context("certificate_digest is not valid hex")?;
        Ok(RecordingLink::new(self.server_version, digest))
    }

    pub fn blob_store(&self) -> Result<MemoryBlobStore> {
        let store = MemoryBlobStore::new();
        for blob in &self.blobs {
            let hash = hex::decode(&blob.hash)
                .with_context(|| format!("blob hash {:?} is not valid hex", blob.hash))?;
            store.insert(hash, blob.content.clone().into_bytes());
        }
        Ok(store)
    }
}
