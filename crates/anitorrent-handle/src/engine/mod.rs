//! In-process torrent engine implementing the native handle surface.
//!
//! Handle objects live in a generational arena behind a single mutex, so
//! native calls are serialized. Events are published after the lock is
//! released.

mod torrent;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anitorrent_config::EngineSettings;
use anitorrent_core::{
    FilePriority, PieceDeadline, ReloadFileResult, TorrentInfo, TrackerEntry,
};
use anitorrent_events::{Event, EventBus};
use tracing::{debug, info};

use crate::arena::{Arena, NativeAddress};
use crate::error::{NativeError, NativeResult};
use crate::native::NativeEngine;
use crate::proxy::OwnedAddress;
use crate::types::AddTorrentParams;
use torrent::TorrentRecord;

/// Source of per-engine address tags; each engine mints addresses only it accepts.
static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct HandleObject {
    id: i64,
    torrent: Option<TorrentRecord>,
    info: Option<Arc<TorrentInfo>>,
}

impl HandleObject {
    fn torrent(&self) -> NativeResult<&TorrentRecord> {
        self.torrent.as_ref().ok_or(NativeError::NotAttached)
    }

    fn torrent_mut(&mut self) -> NativeResult<&mut TorrentRecord> {
        self.torrent.as_mut().ok_or(NativeError::NotAttached)
    }
}

/// Torrent engine running inside the caller's process.
pub struct InProcessEngine {
    handles: Mutex<Arena<HandleObject>>,
    events: EventBus,
    settings: EngineSettings,
}

impl InProcessEngine {
    /// Create an engine publishing to `events`.
    #[must_use]
    pub fn new(settings: EngineSettings, events: EventBus) -> Arc<Self> {
        let engine_id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            engine_id,
            fingerprint = %settings.peer_fingerprint,
            user_agent = %settings.user_agent,
            handshake_client_version = settings.handshake_client_version.as_deref(),
            download_rate_limit = ?settings.download_rate_limit(),
            upload_rate_limit = ?settings.upload_rate_limit(),
            share_ratio_limit = settings.share_ratio_limit,
            "starting in-process torrent engine"
        );
        Arc::new(Self {
            handles: Mutex::new(Arena::new(engine_id)),
            events,
            settings,
        })
    }

    /// Event bus receiving this engine's notifications.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Settings the engine was created with.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Number of live handle objects.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.lock().len()
    }

    /// Allocate a handle object attached to a new torrent.
    ///
    /// The caller receives ownership of the new handle object.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is exhausted.
    pub fn add_torrent(self: &Arc<Self>, params: AddTorrentParams) -> NativeResult<OwnedAddress> {
        let address = self.new_handle()?;
        let engine: Arc<dyn NativeEngine> = self.clone();
        let owned = OwnedAddress::new(engine, address);
        self.start_download(address, params)?;
        Ok(owned)
    }

    /// Attach a new torrent to an existing, detached handle object.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or the handle is already attached.
    pub fn start_download(
        &self,
        address: NativeAddress,
        params: AddTorrentParams,
    ) -> NativeResult<()> {
        let mut record = TorrentRecord::from_params(params)?;
        for url in &self.settings.default_trackers {
            record.add_tracker(TrackerEntry {
                url: url.clone(),
                tier: 0,
                fail_limit: self.settings.default_tracker_fail_limit,
            });
        }

        let event = {
            let mut handles = self.lock();
            let handle = handles
                .get_mut(address)
                .ok_or(NativeError::StaleAddress)?;
            if handle.torrent.is_some() {
                return Err(NativeError::InvalidInput {
                    field: "address",
                    reason: "handle already attached",
                });
            }
            let event = Event::StateChanged {
                handle_id: handle.id,
                state: record.state.code(),
                paused: record.paused,
            };
            handle.torrent = Some(record);
            handle.info = None;
            event
        };

        debug!(%address, "attached torrent to handle");
        let _ = self.events.publish(event);
        Ok(())
    }

    /// Metadata for a magnet-added torrent has arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached, or if the
    /// snapshot's file table does not match its piece geometry.
    pub fn set_metadata(&self, address: NativeAddress, info: TorrentInfo) -> NativeResult<()> {
        let (handle_id, name) = self.with_torrent_mut(address, |torrent| {
            let name = info.name.clone();
            torrent.set_metadata(info)?;
            Ok(name)
        })?;
        let _ = self
            .events
            .publish(Event::MetadataReceived { handle_id, name });
        Ok(())
    }

    /// Detach the torrent from its handle object; the handle becomes invalid but stays allocated.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn remove_torrent(&self, address: NativeAddress) -> NativeResult<()> {
        let handle_id = {
            let mut handles = self.lock();
            let handle = handles
                .get_mut(address)
                .ok_or(NativeError::StaleAddress)?;
            handle.torrent.take().ok_or(NativeError::NotAttached)?;
            handle.id
        };
        debug!(%address, "removed torrent from session");
        let _ = self.events.publish(Event::TorrentRemoved { handle_id });
        Ok(())
    }

    /// Pause an attached torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn pause(&self, address: NativeAddress) -> NativeResult<()> {
        let (handle_id, state) = self.with_torrent_mut(address, |torrent| {
            torrent.paused = true;
            Ok(torrent.state.code())
        })?;
        let _ = self.events.publish(Event::StateChanged {
            handle_id,
            state,
            paused: true,
        });
        Ok(())
    }

    /// Record that a piece finished downloading and passed its hash check.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale, not attached, has no metadata
    /// or the piece index is out of range.
    pub fn record_piece_finished(&self, address: NativeAddress, piece: u32) -> NativeResult<()> {
        let (handle_id, (before, after, paused)) = self.with_torrent_mut(address, |torrent| {
            let before = torrent.state;
            torrent.finish_piece(piece)?;
            Ok((before, torrent.state, torrent.paused))
        })?;
        if before != after {
            let _ = self.events.publish(Event::StateChanged {
                handle_id,
                state: after.code(),
                paused,
            });
        }
        Ok(())
    }

    /// Current piece deadlines, ordered by piece index.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn piece_deadlines(&self, address: NativeAddress) -> NativeResult<Vec<PieceDeadline>> {
        self.with_torrent(address, |torrent| Ok(torrent.piece_deadlines()))
    }

    /// Trackers attached to the torrent, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn trackers(&self, address: NativeAddress) -> NativeResult<Vec<TrackerEntry>> {
        self.with_torrent(address, |torrent| Ok(torrent.trackers.clone()))
    }

    /// Per-file priorities; empty until metadata is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn file_priorities(&self, address: NativeAddress) -> NativeResult<Vec<FilePriority>> {
        self.with_torrent(address, |torrent| Ok(torrent.file_priorities.clone()))
    }

    /// Whether endgame requesting is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn peer_endgame(&self, address: NativeAddress) -> NativeResult<bool> {
        self.with_torrent(address, |torrent| Ok(torrent.endgame))
    }

    /// Whether the torrent is paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is stale or not attached.
    pub fn is_paused(&self, address: NativeAddress) -> NativeResult<bool> {
        self.with_torrent(address, |torrent| Ok(torrent.paused))
    }

    fn lock(&self) -> MutexGuard<'_, Arena<HandleObject>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_handle<T>(
        &self,
        address: NativeAddress,
        f: impl FnOnce(&HandleObject) -> NativeResult<T>,
    ) -> NativeResult<T> {
        let handles = self.lock();
        let handle = handles.get(address).ok_or(NativeError::StaleAddress)?;
        f(handle)
    }

    fn with_torrent<T>(
        &self,
        address: NativeAddress,
        f: impl FnOnce(&TorrentRecord) -> NativeResult<T>,
    ) -> NativeResult<T> {
        self.with_handle(address, |handle| f(handle.torrent()?))
    }

    /// Runs `f` on the attached torrent, returning the handle id alongside its result.
    fn with_torrent_mut<T>(
        &self,
        address: NativeAddress,
        f: impl FnOnce(&mut TorrentRecord) -> NativeResult<T>,
    ) -> NativeResult<(i64, T)> {
        let mut handles = self.lock();
        let handle = handles
            .get_mut(address)
            .ok_or(NativeError::StaleAddress)?;
        let id = handle.id;
        let value = f(handle.torrent_mut()?)?;
        Ok((id, value))
    }
}

impl NativeEngine for InProcessEngine {
    fn new_handle(&self) -> NativeResult<NativeAddress> {
        let address = self
            .lock()
            .insert(HandleObject::default())
            .ok_or(NativeError::InvalidInput {
                field: "address",
                reason: "handle arena exhausted",
            })?;
        debug!(%address, "allocated handle object");
        Ok(address)
    }

    fn destroy_handle(&self, address: NativeAddress) -> NativeResult<()> {
        self.lock()
            .remove(address)
            .ok_or(NativeError::StaleAddress)?;
        debug!(%address, "destroyed handle object");
        Ok(())
    }

    fn id(&self, address: NativeAddress) -> NativeResult<i64> {
        self.with_handle(address, |handle| Ok(handle.id))
    }

    fn set_id(&self, address: NativeAddress, id: i64) -> NativeResult<()> {
        let mut handles = self.lock();
        let handle = handles
            .get_mut(address)
            .ok_or(NativeError::StaleAddress)?;
        handle.id = id;
        Ok(())
    }

    fn info_view(&self, address: NativeAddress) -> NativeResult<Option<Arc<TorrentInfo>>> {
        self.with_handle(address, |handle| Ok(handle.info.clone()))
    }

    fn reload_file(&self, address: NativeAddress) -> NativeResult<i32> {
        let mut handles = self.lock();
        let handle = handles
            .get_mut(address)
            .ok_or(NativeError::StaleAddress)?;
        let result = match handle.torrent.as_ref() {
            None => ReloadFileResult::NullHandle,
            Some(torrent) => match torrent.metadata.clone() {
                None => ReloadFileResult::NullFile,
                Some(info) => {
                    handle.info = Some(info);
                    ReloadFileResult::Success
                }
            },
        };
        Ok(result.code())
    }

    fn is_valid(&self, address: NativeAddress) -> bool {
        self.lock()
            .get(address)
            .is_some_and(|handle| handle.torrent.is_some())
    }

    fn state(&self, address: NativeAddress) -> NativeResult<i32> {
        self.with_torrent(address, |torrent| Ok(torrent.state.code()))
    }

    fn post_status_updates(&self, address: NativeAddress) -> NativeResult<()> {
        let event = self.with_handle(address, |handle| {
            Ok(handle.torrent.as_ref().map(|torrent| Event::StatusUpdated {
                handle_id: handle.id,
                state: torrent.state.code(),
                paused: torrent.paused,
                bytes_downloaded: torrent.bytes_downloaded(),
                bytes_total: torrent.bytes_total(),
            }))
        })?;
        publish_or_skip(&self.events, address, "post_status_updates", event);
        Ok(())
    }

    fn post_save_resume(&self, address: NativeAddress) -> NativeResult<()> {
        let event = self.with_handle(address, |handle| {
            Ok(handle.torrent.as_ref().map(|torrent| Event::ResumeDataSaved {
                handle_id: handle.id,
                payload: torrent.resume_payload(),
            }))
        })?;
        publish_or_skip(&self.events, address, "post_save_resume", event);
        Ok(())
    }

    fn post_file_progress(&self, address: NativeAddress) -> NativeResult<()> {
        let event = self.with_handle(address, |handle| {
            Ok(handle.torrent.as_ref().map(|torrent| Event::FileProgress {
                handle_id: handle.id,
                bytes_per_file: torrent.file_progress(),
            }))
        })?;
        publish_or_skip(&self.events, address, "post_file_progress", event);
        Ok(())
    }

    fn set_piece_deadline(
        &self,
        address: NativeAddress,
        piece: u32,
        deadline_ms: u32,
    ) -> NativeResult<()> {
        self.with_torrent_mut(address, |torrent| {
            torrent.check_piece(piece)?;
            if !torrent.finished_pieces.contains(&piece) {
                torrent.piece_deadlines.insert(piece, deadline_ms);
            }
            Ok(())
        })
        .map(drop)
    }

    fn reset_piece_deadline(&self, address: NativeAddress, piece: u32) -> NativeResult<()> {
        self.with_torrent_mut(address, |torrent| {
            torrent.piece_deadlines.remove(&piece);
            Ok(())
        })
        .map(drop)
    }

    fn clear_piece_deadlines(&self, address: NativeAddress) -> NativeResult<()> {
        self.with_torrent_mut(address, |torrent| {
            torrent.piece_deadlines.clear();
            Ok(())
        })
        .map(drop)
    }

    fn set_peer_endgame(&self, address: NativeAddress, endgame: bool) -> NativeResult<()> {
        self.with_torrent_mut(address, |torrent| {
            torrent.endgame = endgame;
            Ok(())
        })
        .map(drop)
    }

    fn add_tracker(
        &self,
        address: NativeAddress,
        url: &str,
        tier: u8,
        fail_limit: u8,
    ) -> NativeResult<()> {
        if url.trim().is_empty() {
            return Err(NativeError::InvalidInput {
                field: "url",
                reason: "tracker url must not be empty",
            });
        }
        self.with_torrent_mut(address, |torrent| {
            torrent.add_tracker(TrackerEntry {
                url: url.to_string(),
                tier,
                fail_limit,
            });
            Ok(())
        })
        .map(drop)
    }

    fn resume(&self, address: NativeAddress) -> NativeResult<()> {
        let (handle_id, (state, was_paused)) = self.with_torrent_mut(address, |torrent| {
            let was_paused = torrent.paused;
            torrent.paused = false;
            Ok((torrent.state.code(), was_paused))
        })?;
        if was_paused {
            let _ = self.events.publish(Event::StateChanged {
                handle_id,
                state,
                paused: false,
            });
        }
        Ok(())
    }

    fn ignore_all_files(&self, address: NativeAddress) -> NativeResult<()> {
        self.with_torrent_mut(address, TorrentRecord::ignore_all_files)
            .map(drop)
    }

    fn set_file_priority(
        &self,
        address: NativeAddress,
        index: u32,
        priority: FilePriority,
    ) -> NativeResult<()> {
        self.with_torrent_mut(address, |torrent| {
            torrent.set_file_priority(index, priority)
        })
        .map(drop)
    }

    fn make_magnet_uri(&self, address: NativeAddress) -> NativeResult<String> {
        self.with_torrent(address, |torrent| Ok(torrent.magnet_uri()))
    }
}

fn publish_or_skip(
    events: &EventBus,
    address: NativeAddress,
    operation: &'static str,
    event: Option<Event>,
) {
    match event {
        Some(event) => {
            let _ = events.publish(event);
        }
        None => debug!(%address, operation, "handle not attached; nothing to post"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anitorrent_core::{InfoHash, TorrentState};

    fn engine() -> Arc<InProcessEngine> {
        InProcessEngine::new(EngineSettings::default(), EventBus::with_capacity(64))
    }

    fn info() -> TorrentInfo {
        TorrentInfo::from_files(
            "demo",
            InfoHash::new([0x42; 20]),
            16,
            [("demo/a.bin", 20_u64), ("demo/b.bin", 12)],
        )
    }

    #[test]
    fn detached_handle_reports_null_handle_on_reload() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        assert!(!engine.is_valid(address));
        assert_eq!(
            engine.reload_file(address),
            Ok(ReloadFileResult::NullHandle.code())
        );
        assert_eq!(engine.state(address), Err(NativeError::NotAttached));
    }

    #[test]
    fn reload_populates_info_once_metadata_arrives() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::magnet(InfoHash::new([0x42; 20])))
            .expect("attach");

        assert_eq!(
            engine.reload_file(address),
            Ok(ReloadFileResult::NullFile.code())
        );
        assert_eq!(engine.info_view(address), Ok(None));

        engine.set_metadata(address, info()).expect("metadata");
        assert_eq!(
            engine.reload_file(address),
            Ok(ReloadFileResult::Success.code())
        );
        let view = engine.info_view(address).expect("view").expect("loaded");
        assert_eq!(view.name, "demo");
        assert_eq!(view.files.len(), 2);
    }

    #[test]
    fn default_trackers_are_attached_on_add() {
        let settings = EngineSettings {
            default_trackers: vec!["udp://default.example:80/announce".to_string()],
            default_tracker_fail_limit: 3,
            ..EngineSettings::default()
        };
        let engine = InProcessEngine::new(settings, EventBus::with_capacity(8));
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(
                address,
                AddTorrentParams::from_info(info()).with_tracker("http://own.example/announce", 1),
            )
            .expect("attach");

        let trackers = engine.trackers(address).expect("trackers");
        assert_eq!(trackers.len(), 2);
        assert_eq!(trackers[1].fail_limit, 3);
    }

    #[test]
    fn attaching_twice_is_rejected() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::from_info(info()))
            .expect("attach");
        assert!(matches!(
            engine.start_download(address, AddTorrentParams::from_info(info())),
            Err(NativeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn piece_deadlines_skip_finished_pieces() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::from_info(info()))
            .expect("attach");

        engine.record_piece_finished(address, 0).expect("finish");
        engine.set_piece_deadline(address, 0, 100).expect("deadline 0");
        engine.set_piece_deadline(address, 1, 250).expect("deadline 1");
        assert_eq!(
            engine.piece_deadlines(address),
            Ok(vec![PieceDeadline {
                piece: 1,
                deadline_ms: 250
            }])
        );
        assert!(matches!(
            engine.set_piece_deadline(address, 2, 10),
            Err(NativeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn removed_torrent_invalidates_handle_but_keeps_object() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::from_info(info()))
            .expect("attach");
        engine.remove_torrent(address).expect("remove");

        assert!(!engine.is_valid(address));
        assert_eq!(engine.handle_count(), 1);
        assert_eq!(engine.id(address), Ok(0));
        assert_eq!(engine.post_status_updates(address), Ok(()));
    }

    #[test]
    fn destroyed_address_is_stale_everywhere() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine.destroy_handle(address).expect("destroy");

        assert!(!engine.is_valid(address));
        assert_eq!(engine.id(address), Err(NativeError::StaleAddress));
        assert_eq!(engine.destroy_handle(address), Err(NativeError::StaleAddress));
        assert_eq!(engine.handle_count(), 0);
    }

    #[test]
    fn state_follows_metadata_and_pieces() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::magnet(InfoHash::new([0x42; 20])))
            .expect("attach");
        assert_eq!(
            engine.state(address),
            Ok(TorrentState::DownloadingMetadata.code())
        );

        engine.set_metadata(address, info()).expect("metadata");
        assert_eq!(engine.state(address), Ok(TorrentState::Downloading.code()));

        engine.record_piece_finished(address, 0).expect("piece 0");
        engine.record_piece_finished(address, 1).expect("piece 1");
        assert_eq!(engine.state(address), Ok(TorrentState::Seeding.code()));
    }

    #[test]
    fn addresses_from_another_engine_are_stale() {
        let mine = engine();
        let theirs = engine();
        let own = mine.new_handle().expect("handle");
        mine.set_id(own, 1).expect("id");
        let foreign = theirs.new_handle().expect("handle");
        theirs.set_id(foreign, 99).expect("id");

        assert_eq!(own.index(), foreign.index());
        assert_eq!(mine.id(foreign), Err(NativeError::StaleAddress));
        assert!(!mine.is_valid(foreign));
        assert_eq!(mine.destroy_handle(foreign), Err(NativeError::StaleAddress));
        assert_eq!(mine.id(own), Ok(1));
        assert_eq!(theirs.id(foreign), Ok(99));
    }

    #[test]
    fn inconsistent_metadata_is_rejected_before_it_reaches_status() {
        let engine = engine();
        let address = engine.new_handle().expect("handle");
        engine
            .start_download(address, AddTorrentParams::magnet(InfoHash::new([0x42; 20])))
            .expect("attach");

        let mut broken = TorrentInfo::from_files(
            "broken",
            InfoHash::new([0x42; 20]),
            16,
            [("broken/a.bin", 10_u64)],
        );
        broken.num_pieces = 4;
        assert!(matches!(
            engine.set_metadata(address, broken.clone()),
            Err(NativeError::InvalidInput { field: "metadata", .. })
        ));
        assert!(matches!(
            engine.record_piece_finished(address, 3),
            Err(NativeError::MissingMetadata)
        ));
        assert_eq!(engine.post_status_updates(address), Ok(()));

        let other = engine.new_handle().expect("handle");
        assert!(matches!(
            engine.start_download(other, AddTorrentParams::from_info(broken)),
            Err(NativeError::InvalidInput { .. })
        ));
        assert!(!engine.is_valid(other));
    }
}
