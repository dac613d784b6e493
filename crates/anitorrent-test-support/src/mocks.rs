//! Call-recording engine for asserting what reaches the native layer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anitorrent_core::{FilePriority, TorrentInfo};
use anitorrent_handle::{
    AddTorrentParams, HandleProxy, InProcessEngine, NativeAddress, NativeEngine, NativeResult,
};

/// One call observed at the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCall {
    /// Native operation name.
    pub operation: &'static str,
    /// Address the call targeted.
    pub address: NativeAddress,
    /// Whether the address had already been destroyed through this engine.
    pub after_destroy: bool,
}

#[derive(Default)]
struct Journal {
    calls: Vec<RecordedCall>,
    destroyed: HashSet<NativeAddress>,
}

/// [`NativeEngine`] that forwards to an [`InProcessEngine`] and records every call.
pub struct RecordingEngine {
    inner: Arc<InProcessEngine>,
    journal: Mutex<Journal>,
}

impl RecordingEngine {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<InProcessEngine>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            journal: Mutex::new(Journal::default()),
        })
    }

    /// Engine receiving the forwarded calls.
    #[must_use]
    pub const fn inner(&self) -> &Arc<InProcessEngine> {
        &self.inner
    }

    /// Snapshot of every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.journal().calls.clone()
    }

    /// Number of recorded calls named `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.journal()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Total number of recorded calls.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.journal().calls.len()
    }

    /// Calls that targeted an address after it was destroyed.
    #[must_use]
    pub fn calls_after_destroy(&self) -> Vec<RecordedCall> {
        self.journal()
            .calls
            .iter()
            .copied()
            .filter(|call| call.after_destroy)
            .collect()
    }

    /// Owning proxy over a handle attached to a torrent built from `params`.
    ///
    /// # Panics
    ///
    /// Panics if the inner engine rejects the handle or the torrent.
    #[must_use]
    pub fn start(self: &Arc<Self>, params: AddTorrentParams) -> HandleProxy {
        let engine: Arc<dyn NativeEngine> = self.clone();
        let proxy = HandleProxy::allocate(engine).expect("allocate handle");
        let address = proxy.address().expect("fresh proxy has an address");
        self.inner
            .start_download(address, params)
            .expect("attach torrent");
        proxy
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, operation: &'static str, address: NativeAddress) {
        let mut journal = self.journal();
        let after_destroy = journal.destroyed.contains(&address);
        journal.calls.push(RecordedCall {
            operation,
            address,
            after_destroy,
        });
    }
}

impl NativeEngine for RecordingEngine {
    fn new_handle(&self) -> NativeResult<NativeAddress> {
        let address = self.inner.new_handle()?;
        self.record("new_handle", address);
        Ok(address)
    }

    fn destroy_handle(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("destroy_handle", address);
        let result = self.inner.destroy_handle(address);
        self.journal().destroyed.insert(address);
        result
    }

    fn id(&self, address: NativeAddress) -> NativeResult<i64> {
        self.record("id", address);
        self.inner.id(address)
    }

    fn set_id(&self, address: NativeAddress, id: i64) -> NativeResult<()> {
        self.record("set_id", address);
        self.inner.set_id(address, id)
    }

    fn info_view(&self, address: NativeAddress) -> NativeResult<Option<Arc<TorrentInfo>>> {
        self.record("info_view", address);
        self.inner.info_view(address)
    }

    fn reload_file(&self, address: NativeAddress) -> NativeResult<i32> {
        self.record("reload_file", address);
        self.inner.reload_file(address)
    }

    fn is_valid(&self, address: NativeAddress) -> bool {
        self.record("is_valid", address);
        self.inner.is_valid(address)
    }

    fn state(&self, address: NativeAddress) -> NativeResult<i32> {
        self.record("state", address);
        self.inner.state(address)
    }

    fn post_status_updates(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("post_status_updates", address);
        self.inner.post_status_updates(address)
    }

    fn post_save_resume(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("post_save_resume", address);
        self.inner.post_save_resume(address)
    }

    fn post_file_progress(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("post_file_progress", address);
        self.inner.post_file_progress(address)
    }

    fn set_piece_deadline(
        &self,
        address: NativeAddress,
        piece: u32,
        deadline_ms: u32,
    ) -> NativeResult<()> {
        self.record("set_piece_deadline", address);
        self.inner.set_piece_deadline(address, piece, deadline_ms)
    }

    fn reset_piece_deadline(&self, address: NativeAddress, piece: u32) -> NativeResult<()> {
        self.record("reset_piece_deadline", address);
        self.inner.reset_piece_deadline(address, piece)
    }

    fn clear_piece_deadlines(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("clear_piece_deadlines", address);
        self.inner.clear_piece_deadlines(address)
    }

    fn set_peer_endgame(&self, address: NativeAddress, endgame: bool) -> NativeResult<()> {
        self.record("set_peer_endgame", address);
        self.inner.set_peer_endgame(address, endgame)
    }

    fn add_tracker(
        &self,
        address: NativeAddress,
        url: &str,
        tier: u8,
        fail_limit: u8,
    ) -> NativeResult<()> {
        self.record("add_tracker", address);
        self.inner.add_tracker(address, url, tier, fail_limit)
    }

    fn resume(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("resume", address);
        self.inner.resume(address)
    }

    fn ignore_all_files(&self, address: NativeAddress) -> NativeResult<()> {
        self.record("ignore_all_files", address);
        self.inner.ignore_all_files(address)
    }

    fn set_file_priority(
        &self,
        address: NativeAddress,
        index: u32,
        priority: FilePriority,
    ) -> NativeResult<()> {
        self.record("set_file_priority", address);
        self.inner.set_file_priority(address, index, priority)
    }

    fn make_magnet_uri(&self, address: NativeAddress) -> NativeResult<String> {
        self.record("make_magnet_uri", address);
        self.inner.make_magnet_uri(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{engine, sample_info};

    #[test]
    fn records_calls_in_order() {
        let recording = RecordingEngine::new(engine());
        let proxy = recording.start(AddTorrentParams::from_info(sample_info()));
        assert_eq!(proxy.is_valid().ok(), Some(true));
        proxy.destroy().expect("destroy");

        let operations: Vec<_> = recording
            .calls()
            .into_iter()
            .map(|call| call.operation)
            .collect();
        assert_eq!(operations, vec!["new_handle", "is_valid", "destroy_handle"]);
        assert!(recording.calls_after_destroy().is_empty());
    }

    #[test]
    fn flags_calls_on_destroyed_addresses() {
        let recording = RecordingEngine::new(engine());
        let address = recording.new_handle().expect("handle");
        recording.destroy_handle(address).expect("destroy");
        assert!(!recording.is_valid(address));

        let late = recording.calls_after_destroy();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].operation, "is_valid");
    }
}
