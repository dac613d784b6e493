//! Per-handle surface a torrent engine exposes to handle proxies.

use std::sync::Arc;

use anitorrent_core::{FilePriority, TorrentInfo};

use crate::arena::NativeAddress;
use crate::error::NativeResult;

/// Native torrent engine operations, addressed by [`NativeAddress`].
///
/// Implementations validate the address on every call and report
/// [`NativeError::StaleAddress`](crate::NativeError::StaleAddress) for
/// addresses that no longer name a live handle object. Calls are
/// synchronous; fire-and-forget triggers deliver their results through the
/// engine's event bus.
pub trait NativeEngine: Send + Sync {
    /// Allocate a detached handle object.
    fn new_handle(&self) -> NativeResult<NativeAddress>;

    /// Destroy a handle object. The address and all copies of it become stale.
    fn destroy_handle(&self, address: NativeAddress) -> NativeResult<()>;

    /// Caller-assigned identifier stored on the handle object.
    fn id(&self, address: NativeAddress) -> NativeResult<i64>;

    /// Store a caller-assigned identifier on the handle object.
    fn set_id(&self, address: NativeAddress, id: i64) -> NativeResult<()>;

    /// Metadata snapshot loaded by the last successful reload, if any.
    fn info_view(&self, address: NativeAddress) -> NativeResult<Option<Arc<TorrentInfo>>>;

    /// Reload the torrent's metadata into the handle, returning the raw result discriminant.
    fn reload_file(&self, address: NativeAddress) -> NativeResult<i32>;

    /// Whether the handle object is live and attached to a torrent.
    ///
    /// Stale addresses report `false`.
    fn is_valid(&self, address: NativeAddress) -> bool;

    /// Opaque torrent state code.
    fn state(&self, address: NativeAddress) -> NativeResult<i32>;

    /// Request a status snapshot on the event bus.
    fn post_status_updates(&self, address: NativeAddress) -> NativeResult<()>;

    /// Request resume data on the event bus.
    fn post_save_resume(&self, address: NativeAddress) -> NativeResult<()>;

    /// Request per-file progress on the event bus.
    fn post_file_progress(&self, address: NativeAddress) -> NativeResult<()>;

    /// Ask for `piece` to be fetched within `deadline_ms` milliseconds.
    fn set_piece_deadline(
        &self,
        address: NativeAddress,
        piece: u32,
        deadline_ms: u32,
    ) -> NativeResult<()>;

    /// Drop the deadline of a single piece.
    fn reset_piece_deadline(&self, address: NativeAddress, piece: u32) -> NativeResult<()>;

    /// Drop every piece deadline.
    fn clear_piece_deadlines(&self, address: NativeAddress) -> NativeResult<()>;

    /// Toggle endgame requesting for the torrent's peers.
    fn set_peer_endgame(&self, address: NativeAddress, endgame: bool) -> NativeResult<()>;

    /// Attach a tracker at `tier`, tolerating `fail_limit` consecutive failures.
    fn add_tracker(
        &self,
        address: NativeAddress,
        url: &str,
        tier: u8,
        fail_limit: u8,
    ) -> NativeResult<()>;

    /// Resume a paused torrent.
    fn resume(&self, address: NativeAddress) -> NativeResult<()>;

    /// Deselect every file from download.
    fn ignore_all_files(&self, address: NativeAddress) -> NativeResult<()>;

    /// Set the download priority of one file.
    fn set_file_priority(
        &self,
        address: NativeAddress,
        index: u32,
        priority: FilePriority,
    ) -> NativeResult<()>;

    /// Magnet link describing the torrent.
    fn make_magnet_uri(&self, address: NativeAddress) -> NativeResult<String>;
}
