//! Strongly typed inputs accepted by the in-process engine.

use anitorrent_core::{InfoHash, TorrentInfo, TrackerEntry};

/// Parameters for attaching a torrent to a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrentParams {
    /// Info hash of the torrent.
    pub info_hash: InfoHash,
    /// Display name used until metadata is known.
    pub name: Option<String>,
    /// Metadata, when the torrent file is already available.
    pub metadata: Option<TorrentInfo>,
    /// Trackers supplied with the torrent.
    pub trackers: Vec<TrackerEntry>,
    /// Whether the torrent starts paused.
    pub paused: bool,
}

impl AddTorrentParams {
    /// Add by info hash only; metadata arrives later from peers.
    #[must_use]
    pub const fn magnet(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            name: None,
            metadata: None,
            trackers: Vec::new(),
            paused: false,
        }
    }

    /// Add from a known metadata snapshot.
    #[must_use]
    pub fn from_info(info: TorrentInfo) -> Self {
        Self {
            info_hash: info.info_hash,
            name: Some(info.name.clone()),
            metadata: Some(info),
            trackers: Vec::new(),
            paused: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a tracker.
    #[must_use]
    pub fn with_tracker(mut self, url: impl Into<String>, tier: u8) -> Self {
        self.trackers.push(TrackerEntry {
            url: url.into(),
            tier,
            fail_limit: 0,
        });
        self
    }

    /// Start the torrent paused.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }
}
