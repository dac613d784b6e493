//! Streaming download window over a torrent's pieces.
//!
//! # Design
//!
//! - Playback needs the pieces right after the playhead first. The
//!   controller keeps a window of the first `window_size` unfinished pieces
//!   at or after the playhead; finished pieces drop out and the window
//!   refills from behind.
//! - Until the first seek the container header and footer are requested
//!   too, since players read both ends before decoding.
//! - The controller only computes plans. [`PiecePriorities`] applies them;
//!   [`DeadlinePriorities`] maps a plan onto piece deadlines of a handle.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use anitorrent_core::{HandleResult, TorrentInfo};
use tracing::debug;

use crate::proxy::HandleProxy;

/// Window geometry for streaming playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingWindow {
    /// Unfinished pieces requested after the playhead.
    pub window_size: u32,
    /// Bytes at the start of the payload requested before the first seek.
    pub header_size: u64,
    /// Bytes at the end of the payload requested before the first seek.
    pub footer_size: u64,
    /// Bytes at the end that may hold the container index; their deadlines are kept.
    pub possible_footer_size: u64,
}

/// Pieces to download, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiecePlan {
    /// Requested pieces.
    pub pieces: Vec<u32>,
    /// Trailing pieces that may hold the container index, while header and footer are requested.
    pub possible_footer: Option<RangeInclusive<u32>>,
}

/// Sink applying piece plans to a torrent.
pub trait PiecePriorities {
    /// Download only the pieces named by `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying handle rejects the update.
    fn download_only(&mut self, plan: &PiecePlan) -> HandleResult<()>;
}

/// Drives a [`PiecePriorities`] sink from playback and download progress.
#[derive(Debug)]
pub struct DownloadController<P> {
    priorities: P,
    finished: Vec<bool>,
    header_pieces: u32,
    footer_pieces: u32,
    possible_footer_pieces: u32,
    window_size: u32,
    playhead: u32,
    edges: bool,
    active: bool,
}

impl<P: PiecePriorities> DownloadController<P> {
    /// Controller for the torrent described by `info`, with no piece finished.
    #[must_use]
    pub fn new(info: &TorrentInfo, window: StreamingWindow, priorities: P) -> Self {
        let num_pieces = info.num_pieces;
        let pieces_for = |bytes: u64| {
            if info.piece_length == 0 {
                return 0;
            }
            let count = bytes.div_ceil(u64::from(info.piece_length));
            u32::try_from(count).map_or(num_pieces, |count| count.min(num_pieces))
        };
        Self {
            header_pieces: pieces_for(window.header_size),
            footer_pieces: pieces_for(window.footer_size),
            possible_footer_pieces: pieces_for(window.possible_footer_size),
            window_size: window.window_size,
            finished: vec![false; usize::try_from(num_pieces).unwrap_or(usize::MAX)],
            priorities,
            playhead: 0,
            edges: true,
            active: false,
        }
    }

    /// Sink receiving the plans.
    pub const fn priorities(&self) -> &P {
        &self.priorities
    }

    /// Start requesting pieces from the current playhead.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the plan.
    pub fn on_torrent_resumed(&mut self) -> HandleResult<()> {
        self.active = true;
        self.apply()
    }

    /// A piece finished downloading; the window moves past it.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the plan.
    pub fn on_piece_downloaded(&mut self, piece: u32) -> HandleResult<()> {
        let Some(slot) = usize::try_from(piece)
            .ok()
            .and_then(|index| self.finished.get_mut(index))
        else {
            debug!(piece, "ignoring progress for piece outside the torrent");
            return Ok(());
        };
        *slot = true;
        if self.active { self.apply() } else { Ok(()) }
    }

    /// Playback jumped to `piece`. Header and footer are no longer requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the plan.
    pub fn on_seek(&mut self, piece: u32) -> HandleResult<()> {
        self.playhead = piece;
        self.edges = false;
        self.active = true;
        self.apply()
    }

    /// Plan for the current playhead and progress.
    #[must_use]
    pub fn plan(&self) -> PiecePlan {
        let num_pieces = self.num_pieces();
        let window = (self.playhead..num_pieces)
            .filter(|piece| !self.is_finished(*piece))
            .take(usize::try_from(self.window_size).unwrap_or(usize::MAX));
        let mut pieces: BTreeSet<u32> = window.collect();

        let mut possible_footer = None;
        if self.edges {
            let footer_start = num_pieces - self.footer_pieces;
            pieces.extend(
                (0..self.header_pieces)
                    .chain(footer_start..num_pieces)
                    .filter(|piece| !self.is_finished(*piece)),
            );
            if self.possible_footer_pieces > 0 {
                possible_footer = Some(num_pieces - self.possible_footer_pieces..=num_pieces - 1);
            }
        }

        PiecePlan {
            pieces: pieces.into_iter().collect(),
            possible_footer,
        }
    }

    fn apply(&mut self) -> HandleResult<()> {
        let plan = self.plan();
        debug!(
            playhead = self.playhead,
            requested = plan.pieces.len(),
            "applying piece plan"
        );
        self.priorities.download_only(&plan)
    }

    fn num_pieces(&self) -> u32 {
        u32::try_from(self.finished.len()).unwrap_or(u32::MAX)
    }

    fn is_finished(&self, piece: u32) -> bool {
        usize::try_from(piece)
            .ok()
            .and_then(|index| self.finished.get(index))
            .copied()
            .unwrap_or(true)
    }
}

/// Applies plans as piece deadlines on a handle, earliest piece first.
///
/// Pieces leaving the plan lose their deadline unless they sit in the
/// possible footer range.
#[derive(Debug)]
pub struct DeadlinePriorities<'a> {
    proxy: &'a HandleProxy,
    step_ms: u32,
    active: BTreeSet<u32>,
}

impl<'a> DeadlinePriorities<'a> {
    /// Deadlines grow by `step_ms` per position in the plan.
    #[must_use]
    pub const fn new(proxy: &'a HandleProxy, step_ms: u32) -> Self {
        Self {
            proxy,
            step_ms,
            active: BTreeSet::new(),
        }
    }
}

impl PiecePriorities for DeadlinePriorities<'_> {
    fn download_only(&mut self, plan: &PiecePlan) -> HandleResult<()> {
        let wanted: BTreeSet<u32> = plan.pieces.iter().copied().collect();
        let keep = |piece: &u32| {
            plan.possible_footer
                .as_ref()
                .is_some_and(|range| range.contains(piece))
        };

        let dropped: Vec<u32> = self
            .active
            .difference(&wanted)
            .copied()
            .filter(|piece| !keep(piece))
            .collect();
        for piece in &dropped {
            self.proxy.reset_piece_deadline(*piece)?;
            self.active.remove(piece);
        }

        let mut deadline_ms = 0_u32;
        for piece in &plan.pieces {
            self.proxy.set_piece_deadline(*piece, deadline_ms)?;
            self.active.insert(*piece);
            deadline_ms = deadline_ms.saturating_add(self.step_ms);
        }
        Ok(())
    }
}
