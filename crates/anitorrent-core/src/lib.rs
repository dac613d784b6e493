#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(missing_docs, unreachable_pub)]

//! Engine-agnostic types shared by the torrent handle proxy and its engines.

/// Error types surfaced by handle operations.
pub mod error;
/// Magnet link construction.
pub mod magnet;
/// Enumerations, metadata snapshots and tracker descriptors.
pub mod model;

pub use error::{HandleError, HandleResult};
pub use magnet::MagnetLink;
pub use model::{
    FileEntry, FilePriority, InfoHash, InfoHashParseError, PieceDeadline, ReloadFileResult,
    TorrentInfo, TorrentState, TrackerEntry,
};
