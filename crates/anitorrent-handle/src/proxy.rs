//! Caller-side proxy for a native torrent handle object.
//!
//! # Design
//!
//! - The proxy's address and ownership flag live behind one `RwLock`.
//!   Forwarding calls hold the read lock across the native call; `release`
//!   and `destroy` take the write lock, so they wait for in-flight calls and
//!   no call can start against a cleared address.
//! - Ownership moves only through [`HandleProxy::release`] →
//!   [`OwnedAddress`] → [`HandleProxy::adopt`].
//! - Dropping an owning proxy destroys the native object.

use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anitorrent_core::{FilePriority, HandleError, HandleResult, ReloadFileResult, TorrentInfo};
use tracing::{debug, warn};

use crate::arena::NativeAddress;
use crate::engine::InProcessEngine;
use crate::error::NativeResult;
use crate::native::NativeEngine;
use crate::types::AddTorrentParams;

#[derive(Debug, Clone, Copy)]
struct ProxyState {
    address: Option<NativeAddress>,
    owns: bool,
}

impl ProxyState {
    const INERT: Self = Self {
        address: None,
        owns: false,
    };
}

/// Reference to a native torrent handle object.
pub struct HandleProxy {
    engine: Arc<dyn NativeEngine>,
    state: RwLock<ProxyState>,
}

impl std::fmt::Debug for HandleProxy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.read();
        formatter
            .debug_struct("HandleProxy")
            .field("address", &state.address)
            .field("owns", &state.owns)
            .finish_non_exhaustive()
    }
}

impl HandleProxy {
    /// Wrap an address produced elsewhere without taking ownership.
    ///
    /// Dropping the proxy leaves the native object alive.
    #[must_use]
    pub fn wrap(engine: Arc<dyn NativeEngine>, address: NativeAddress) -> Self {
        Self::with_state(
            engine,
            ProxyState {
                address: Some(address),
                owns: false,
            },
        )
    }

    /// Allocate a fresh, detached native handle object and own it.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate a handle object.
    pub fn allocate(engine: Arc<dyn NativeEngine>) -> HandleResult<Self> {
        let address = engine
            .new_handle()
            .map_err(|err| err.into_handle_error("allocate"))?;
        debug!(%address, "allocated owning handle proxy");
        Ok(Self::with_state(
            engine,
            ProxyState {
                address: Some(address),
                owns: true,
            },
        ))
    }

    /// Add a torrent to an in-process engine and own the resulting handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the torrent.
    pub fn start(engine: &Arc<InProcessEngine>, params: AddTorrentParams) -> HandleResult<Self> {
        engine
            .add_torrent(params)
            .map(OwnedAddress::into_proxy)
            .map_err(|err| err.into_handle_error("start"))
    }

    /// Take ownership of a released address.
    #[must_use]
    pub fn adopt(mut owned: OwnedAddress) -> Self {
        let address = owned.address.take();
        Self::with_state(
            Arc::clone(&owned.engine),
            ProxyState {
                owns: address.is_some(),
                address,
            },
        )
    }

    fn with_state(engine: Arc<dyn NativeEngine>, state: ProxyState) -> Self {
        Self {
            engine,
            state: RwLock::new(state),
        }
    }

    /// Current native address; `None` once released or destroyed.
    #[must_use]
    pub fn address(&self) -> Option<NativeAddress> {
        self.read().address
    }

    /// Whether this proxy owns its native object.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.read().owns
    }

    /// Whether the address has been cleared by `release` or `destroy`.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.read().address.is_none()
    }

    /// Caller-assigned identifier stored on the native object.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn id(&self) -> HandleResult<i64> {
        self.forward("id", |engine, address| engine.id(address))
    }

    /// Store a caller-assigned identifier on the native object.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn set_id(&self, id: i64) -> HandleResult<()> {
        self.forward("set_id", |engine, address| engine.set_id(address, id))
    }

    /// Metadata loaded by the last successful [`reload_file`](Self::reload_file).
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn info_view(&self) -> HandleResult<Option<InfoView>> {
        self.forward("info_view", |engine, address| engine.info_view(address))
            .map(|info| info.map(InfoView))
    }

    /// Reload the torrent's metadata into the handle.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release,
    /// [`HandleError::UnknownDiscriminant`] if the engine answers with an
    /// unknown result code, or the native failure.
    pub fn reload_file(&self) -> HandleResult<ReloadFileResult> {
        let raw = self.forward("reload_file", |engine, address| engine.reload_file(address))?;
        ReloadFileResult::try_from(raw)
    }

    /// Whether the native object is alive and attached to a torrent.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release.
    pub fn is_valid(&self) -> HandleResult<bool> {
        self.forward("is_valid", |engine, address| Ok(engine.is_valid(address)))
    }

    /// Opaque state code reported by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn state(&self) -> HandleResult<i32> {
        self.forward("state", |engine, address| engine.state(address))
    }

    /// Request a status snapshot; it arrives on the engine's event bus.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or
    /// [`HandleError::StaleAddress`].
    pub fn post_status_updates(&self) -> HandleResult<()> {
        self.forward("post_status_updates", |engine, address| {
            engine.post_status_updates(address)
        })
    }

    /// Request resume data; it arrives on the engine's event bus.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or
    /// [`HandleError::StaleAddress`].
    pub fn post_save_resume(&self) -> HandleResult<()> {
        self.forward("post_save_resume", |engine, address| {
            engine.post_save_resume(address)
        })
    }

    /// Request per-file progress; it arrives on the engine's event bus.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or
    /// [`HandleError::StaleAddress`].
    pub fn post_file_progress(&self) -> HandleResult<()> {
        self.forward("post_file_progress", |engine, address| {
            engine.post_file_progress(address)
        })
    }

    /// Ask for `piece` to be fetched within `deadline_ms` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn set_piece_deadline(&self, piece: u32, deadline_ms: u32) -> HandleResult<()> {
        self.forward("set_piece_deadline", |engine, address| {
            engine.set_piece_deadline(address, piece, deadline_ms)
        })
    }

    /// Drop the deadline of one piece.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn reset_piece_deadline(&self, piece: u32) -> HandleResult<()> {
        self.forward("reset_piece_deadline", |engine, address| {
            engine.reset_piece_deadline(address, piece)
        })
    }

    /// Drop every piece deadline.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn clear_piece_deadlines(&self) -> HandleResult<()> {
        self.forward("clear_piece_deadlines", |engine, address| {
            engine.clear_piece_deadlines(address)
        })
    }

    /// Toggle endgame requesting.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn set_peer_endgame(&self, endgame: bool) -> HandleResult<()> {
        self.forward("set_peer_endgame", |engine, address| {
            engine.set_peer_endgame(address, endgame)
        })
    }

    /// Attach a tracker.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn add_tracker(&self, url: &str, tier: u8, fail_limit: u8) -> HandleResult<()> {
        self.forward("add_tracker", |engine, address| {
            engine.add_tracker(address, url, tier, fail_limit)
        })
    }

    /// Resume a paused torrent.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn resume(&self) -> HandleResult<()> {
        self.forward("resume", |engine, address| engine.resume(address))
    }

    /// Deselect every file from download.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn ignore_all_files(&self) -> HandleResult<()> {
        self.forward("ignore_all_files", |engine, address| {
            engine.ignore_all_files(address)
        })
    }

    /// Set one file's download priority.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn set_file_priority(&self, index: u32, priority: FilePriority) -> HandleResult<()> {
        self.forward("set_file_priority", |engine, address| {
            engine.set_file_priority(address, index, priority)
        })
    }

    /// Magnet link for sharing the torrent.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UseAfterRelease`] after release, or the native failure.
    pub fn make_magnet_uri(&self) -> HandleResult<String> {
        self.forward("make_magnet_uri", |engine, address| {
            engine.make_magnet_uri(address)
        })
    }

    /// Give up ownership, handing the native object to the returned token.
    ///
    /// The proxy becomes inert. The native object is untouched until the
    /// token is adopted or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::NotOwner`] if the proxy does not own its address,
    /// including when it was already released.
    pub fn release(&self) -> HandleResult<OwnedAddress> {
        let mut state = self.write();
        let address = match *state {
            ProxyState {
                address: Some(address),
                owns: true,
            } => address,
            _ => return Err(HandleError::NotOwner { operation: "release" }),
        };
        *state = ProxyState::INERT;
        debug!(%address, "released handle ownership");
        Ok(OwnedAddress::new(Arc::clone(&self.engine), address))
    }

    /// Destroy the native object if owned, then clear the address.
    ///
    /// Idempotent: once the address is cleared further calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the native failure if destroying an owned object failed; the
    /// proxy is inert afterwards either way.
    pub fn destroy(&self) -> HandleResult<()> {
        let mut state = self.write();
        let previous = *state;
        *state = ProxyState::INERT;

        match previous {
            ProxyState {
                address: Some(address),
                owns: true,
            } => {
                debug!(%address, "destroying owned handle object");
                self.engine
                    .destroy_handle(address)
                    .map_err(|err| err.into_handle_error("destroy"))
            }
            _ => Ok(()),
        }
    }

    fn forward<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn NativeEngine, NativeAddress) -> NativeResult<T>,
    ) -> HandleResult<T> {
        let state = self.read();
        let Some(address) = state.address else {
            return Err(HandleError::UseAfterRelease { operation });
        };
        debug!(%address, operation, "forwarding handle call");
        call(self.engine.as_ref(), address).map_err(|err| err.into_handle_error(operation))
    }

    fn read(&self) -> RwLockReadGuard<'_, ProxyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProxyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HandleProxy {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            warn!(error = %err, "failed to destroy handle object on drop");
        }
    }
}

/// Ownership of a native handle object in transit between proxies.
///
/// Dropping the token without adopting it destroys the native object.
pub struct OwnedAddress {
    engine: Arc<dyn NativeEngine>,
    address: Option<NativeAddress>,
}

impl OwnedAddress {
    pub(crate) fn new(engine: Arc<dyn NativeEngine>, address: NativeAddress) -> Self {
        Self {
            engine,
            address: Some(address),
        }
    }

    /// Address being transferred.
    #[must_use]
    pub fn address(&self) -> Option<NativeAddress> {
        self.address
    }

    /// Adopt into a new owning proxy.
    #[must_use]
    pub fn into_proxy(self) -> HandleProxy {
        HandleProxy::adopt(self)
    }
}

impl std::fmt::Debug for OwnedAddress {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OwnedAddress")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Drop for OwnedAddress {
    fn drop(&mut self) {
        if let Some(address) = self.address.take()
            && let Err(err) = self.engine.destroy_handle(address)
        {
            warn!(%address, error = %err, "failed to destroy unadopted handle object");
        }
    }
}

/// Read-only metadata snapshot obtained from a handle.
///
/// The snapshot is immutable and stays readable after the handle is released.
#[derive(Debug, Clone)]
pub struct InfoView(Arc<TorrentInfo>);

impl Deref for InfoView {
    type Target = TorrentInfo;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
