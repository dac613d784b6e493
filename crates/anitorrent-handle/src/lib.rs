#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(missing_docs, unreachable_pub)]

//! Ownership-checked proxy over native torrent handle objects.
//!
//! A [`HandleProxy`] forwards every per-torrent call to a [`NativeEngine`]
//! and tracks whether it owns the native object it points at. The
//! [`InProcessEngine`] implements the native surface inside the process.

mod arena;
/// Streaming piece window driving handle deadlines.
pub mod controller;
mod engine;
/// Errors reported by native engines.
pub mod error;
/// Native engine trait.
pub mod native;
mod proxy;
/// Torrent parameters accepted by the in-process engine.
pub mod types;

pub use arena::NativeAddress;
pub use controller::{
    DeadlinePriorities, DownloadController, PiecePlan, PiecePriorities, StreamingWindow,
};
pub use engine::InProcessEngine;
pub use error::{NativeError, NativeResult};
pub use native::NativeEngine;
pub use proxy::{HandleProxy, InfoView, OwnedAddress};
pub use types::AddTorrentParams;
