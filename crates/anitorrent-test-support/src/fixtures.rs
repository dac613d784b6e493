//! Sample torrents and engine builders.

use std::sync::Arc;

use anitorrent_config::EngineSettings;
use anitorrent_core::{InfoHash, TorrentInfo};
use anitorrent_events::EventBus;
use anitorrent_handle::InProcessEngine;

/// Piece length used by [`sample_info`].
pub const SAMPLE_PIECE_LENGTH: u32 = 16;

/// Deterministic info hash for sample torrents.
#[must_use]
pub const fn sample_hash() -> InfoHash {
    InfoHash::new([0xab; 20])
}

/// Two-file torrent of 48 bytes split into three 16-byte pieces.
///
/// File 0 covers pieces 0..=1, file 1 covers pieces 1..=2.
#[must_use]
pub fn sample_info() -> TorrentInfo {
    TorrentInfo::from_files(
        "Sample Show",
        sample_hash(),
        SAMPLE_PIECE_LENGTH,
        [("Sample Show/01.mkv", 24_u64), ("Sample Show/01.ass", 24)],
    )
}

/// Engine with default settings and a fresh event bus.
#[must_use]
pub fn engine() -> Arc<InProcessEngine> {
    engine_with(EngineSettings::default())
}

/// Engine with custom settings and a fresh event bus.
#[must_use]
pub fn engine_with(settings: EngineSettings) -> Arc<InProcessEngine> {
    InProcessEngine::new(settings, EventBus::with_capacity(256))
}
