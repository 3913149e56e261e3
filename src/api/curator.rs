//! Bookkeeping for host-allocated buffers lent to plugins.
//!
//! Buffers live in an arena addressed by generation-checked handles. Plugins
//! only ever see raw addresses, so a second index maps each live address back
//! to its handle. The curator is owned by the host thread and never locked.

use std::collections::HashMap;
use std::ffi::CString;

use super::error::{ApiResult, ErrorCode};
use super::types::{ChannelId, Lent, LentStr, PluginId, UserId};

/// Opaque handle to a curated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

/// The owned memory behind a lent pointer. Dropping it is the deleter.
#[derive(Debug)]
pub enum LentBuffer {
    Text(CString),
    UserIds(Vec<UserId>),
    ChannelIds(Vec<ChannelId>),
}

impl LentBuffer {
    /// Build a text buffer. Like a C string copy, the value ends at the first
    /// interior NUL.
    pub fn text(value: &str) -> Self {
        let bytes = value.as_bytes();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        let mut owned = Vec::with_capacity(end + 1);
        owned.extend_from_slice(&bytes[..end]);
        // SAFETY: `owned` was cut before the first NUL.
        Self::Text(unsafe { CString::from_vec_unchecked(owned) })
    }

    fn address(&self) -> usize {
        match self {
            Self::Text(text) => text.as_ptr() as usize,
            Self::UserIds(ids) => ids.as_ptr() as usize,
            Self::ChannelIds(ids) => ids.as_ptr() as usize,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::UserIds(_) => "user ids",
            Self::ChannelIds(_) => "channel ids",
        }
    }
}

// Empty vectors share a dangling address; force a real allocation so every
// lent array is distinguishable by its pointer.
fn with_own_allocation<T>(mut values: Vec<T>) -> Vec<T> {
    if values.capacity() == 0 {
        values.reserve_exact(1);
    }
    values
}

#[derive(Debug)]
struct Entry {
    buffer: LentBuffer,
    plugin: PluginId,
    call: &'static str,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// A buffer that was still registered when the curator shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakReport {
    pub plugin: PluginId,
    pub call: &'static str,
    pub kind: &'static str,
}

#[derive(Debug, Default)]
pub struct ResourceCurator {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    by_address: HashMap<usize, ResourceHandle>,
}

impl ResourceCurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `buffer` on behalf of `plugin`.
    ///
    /// Returns `None` if the address is already tracked; `buffer` is dropped
    /// and the existing entry is left alone.
    pub fn register(
        &mut self,
        buffer: LentBuffer,
        plugin: PluginId,
        call: &'static str,
    ) -> Option<ResourceHandle> {
        let address = buffer.address();
        if self.by_address.contains_key(&address) {
            tracing::warn!(
                plugin_id = plugin,
                call,
                "Buffer address already curated, keeping the existing entry"
            );
            return None;
        }

        let entry = Entry {
            buffer,
            plugin,
            call,
        };
        let handle = match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ResourceHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ResourceHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_address.insert(address, handle);
        tracing::trace!(plugin_id = plugin, call, "Curated lent buffer");
        Some(handle)
    }

    /// Copy `value` into a curated NUL-terminated buffer.
    pub fn lend_str(
        &mut self,
        plugin: PluginId,
        call: &'static str,
        value: &str,
    ) -> ApiResult<LentStr> {
        let buffer = LentBuffer::text(value);
        let lent = match &buffer {
            LentBuffer::Text(text) => Lent::new(text.as_ptr(), text.as_bytes().len()),
            _ => return Err(ErrorCode::InternalError),
        };
        self.register(buffer, plugin, call)
            .ok_or(ErrorCode::InternalError)?;
        Ok(lent)
    }

    pub fn lend_user_ids(
        &mut self,
        plugin: PluginId,
        call: &'static str,
        ids: Vec<UserId>,
    ) -> ApiResult<Lent<UserId>> {
        let ids = with_own_allocation(ids);
        let lent = Lent::new(ids.as_ptr(), ids.len());
        self.register(LentBuffer::UserIds(ids), plugin, call)
            .ok_or(ErrorCode::InternalError)?;
        Ok(lent)
    }

    pub fn lend_channel_ids(
        &mut self,
        plugin: PluginId,
        call: &'static str,
        ids: Vec<ChannelId>,
    ) -> ApiResult<Lent<ChannelId>> {
        let ids = with_own_allocation(ids);
        let lent = Lent::new(ids.as_ptr(), ids.len());
        self.register(LentBuffer::ChannelIds(ids), plugin, call)
            .ok_or(ErrorCode::InternalError)?;
        Ok(lent)
    }

    /// Free the buffer at `address`, the only way a plugin returns memory.
    pub fn release(&mut self, address: usize) -> ApiResult<()> {
        let handle = self
            .by_address
            .remove(&address)
            .ok_or(ErrorCode::PointerNotFound)?;
        let entry = self.take(handle).ok_or(ErrorCode::PointerNotFound)?;
        tracing::trace!(
            plugin_id = entry.plugin,
            call = entry.call,
            "Released lent buffer"
        );
        Ok(())
    }

    fn take(&mut self, handle: ResourceHandle) -> Option<Entry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(handle.index);
        Some(entry)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.by_address.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Force-free everything still registered, reporting each entry once.
    pub fn shutdown(&mut self) -> Vec<LeakReport> {
        let handles: Vec<ResourceHandle> = self.by_address.drain().map(|(_, h)| h).collect();
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(entry) = self.take(handle) {
                tracing::error!(
                    plugin_id = entry.plugin,
                    call = entry.call,
                    kind = entry.buffer.kind(),
                    "Plugin leaked memory from an API call"
                );
                reports.push(LeakReport {
                    plugin: entry.plugin,
                    call: entry.call,
                    kind: entry.buffer.kind(),
                });
            }
        }
        self.slots.clear();
        self.vacant.clear();
        reports
    }
}

impl Drop for ResourceCurator {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lent_string_is_nul_terminated() {
        let mut curator = ResourceCurator::new();
        let lent = curator.lend_str(3, "get_user_name", "Alice").unwrap();
        let text = unsafe { lent.as_c_str() };
        assert_eq!(text.to_bytes_with_nul(), b"Alice\0");
        assert_eq!(lent.len(), 5);
        assert!(curator.contains(lent.as_ptr() as usize));
    }

    #[test]
    fn interior_nul_truncates_like_strcpy() {
        let mut curator = ResourceCurator::new();
        let lent = curator.lend_str(1, "get_user_comment", "ab\0cd").unwrap();
        assert_eq!(unsafe { lent.as_c_str() }.to_bytes(), b"ab");
    }

    #[test]
    fn release_then_double_release() {
        let mut curator = ResourceCurator::new();
        let lent = curator.lend_str(3, "get_channel_name", "Lobby").unwrap();
        let address = lent.as_ptr() as usize;
        assert_eq!(curator.release(address), Ok(()));
        assert_eq!(curator.release(address), Err(ErrorCode::PointerNotFound));
        assert!(curator.is_empty());
    }

    #[test]
    fn unknown_address_is_not_found() {
        let mut curator = ResourceCurator::new();
        assert_eq!(curator.release(0xdead), Err(ErrorCode::PointerNotFound));
    }

    #[test]
    fn empty_arrays_get_distinct_addresses() {
        let mut curator = ResourceCurator::new();
        let first = curator.lend_user_ids(1, "get_all_users", Vec::new()).unwrap();
        let second = curator.lend_user_ids(1, "get_users_in_channel", Vec::new()).unwrap();
        assert!(first.is_empty());
        assert_ne!(first.as_ptr(), second.as_ptr());
        assert_eq!(curator.len(), 2);
    }

    #[test]
    fn arrays_keep_their_contents() {
        let mut curator = ResourceCurator::new();
        let lent = curator
            .lend_channel_ids(2, "get_all_channels", vec![0, 4, 9])
            .unwrap();
        assert_eq!(unsafe { lent.as_slice() }, &[0, 4, 9]);
    }

    #[test]
    fn slots_are_reused_with_new_generation() {
        let mut curator = ResourceCurator::new();
        let first = curator.register(LentBuffer::text("a"), 1, "a").unwrap();
        let address = curator.by_address.iter().next().map(|(a, _)| *a).unwrap();
        curator.release(address).unwrap();
        let second = curator.register(LentBuffer::text("b"), 1, "b").unwrap();
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(curator.take(first).is_none());
    }

    #[test]
    fn shutdown_reports_each_leak_once() {
        let mut curator = ResourceCurator::new();
        curator.lend_str(3, "get_user_name", "Alice").unwrap();
        curator.lend_user_ids(4, "get_all_users", vec![1, 2]).unwrap();
        let freed = curator.lend_str(3, "get_user_hash", "abc").unwrap();
        curator.release(freed.as_ptr() as usize).unwrap();

        let mut reports = curator.shutdown();
        reports.sort_by_key(|r| r.plugin);
        assert_eq!(
            reports,
            vec![
                LeakReport {
                    plugin: 3,
                    call: "get_user_name",
                    kind: "text"
                },
                LeakReport {
                    plugin: 4,
                    call: "get_all_users",
                    kind: "user ids"
                },
            ]
        );
        assert!(curator.is_empty());
        assert!(curator.shutdown().is_empty());
    }
}
