//! Magnet link construction for sharing torrents.

use std::fmt;

use crate::model::{InfoHash, TrackerEntry};

/// Magnet link describing a torrent by info hash, name and trackers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    info_hash: InfoHash,
    name: Option<String>,
    trackers: Vec<String>,
}

impl MagnetLink {
    /// Start a link for the given info hash.
    #[must_use]
    pub const fn new(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            name: None,
            trackers: Vec::new(),
        }
    }

    /// Attach a display name (`dn`). Empty names are omitted.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.is_empty()).then_some(name);
        self
    }

    /// Attach trackers (`tr`), ordered by tier then insertion order.
    #[must_use]
    pub fn with_trackers<'a>(mut self, trackers: impl IntoIterator<Item = &'a TrackerEntry>) -> Self {
        let mut ordered: Vec<&TrackerEntry> = trackers.into_iter().collect();
        ordered.sort_by_key(|tracker| tracker.tier);
        self.trackers = ordered
            .into_iter()
            .map(|tracker| tracker.url.clone())
            .collect();
        self
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "magnet:?xt=urn:btih:{}", self.info_hash.to_hex())?;
        if let Some(name) = &self.name {
            write!(formatter, "&dn={}", urlencoding::encode(name))?;
        }
        for tracker in &self.trackers {
            write!(formatter, "&tr={}", urlencoding::encode(tracker))?;
        }
        Ok(())
    }
}
