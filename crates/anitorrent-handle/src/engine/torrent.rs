use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anitorrent_core::{
    FilePriority, InfoHash, MagnetLink, PieceDeadline, TorrentInfo, TorrentState, TrackerEntry,
};
use serde_json::json;
use tracing::debug;

use crate::error::{NativeError, NativeResult};
use crate::types::AddTorrentParams;

/// Torrent attached to a handle object.
#[derive(Debug, Clone)]
pub(super) struct TorrentRecord {
    pub(super) info_hash: InfoHash,
    pub(super) name: Option<String>,
    pub(super) metadata: Option<Arc<TorrentInfo>>,
    pub(super) paused: bool,
    pub(super) state: TorrentState,
    pub(super) endgame: bool,
    pub(super) trackers: Vec<TrackerEntry>,
    pub(super) piece_deadlines: BTreeMap<u32, u32>,
    pub(super) file_priorities: Vec<FilePriority>,
    pub(super) finished_pieces: BTreeSet<u32>,
}

impl TorrentRecord {
    pub(super) fn from_params(params: AddTorrentParams) -> NativeResult<Self> {
        let AddTorrentParams {
            info_hash,
            name,
            metadata,
            trackers,
            paused,
        } = params;

        let mut record = Self {
            info_hash,
            name,
            metadata: None,
            paused,
            state: TorrentState::DownloadingMetadata,
            endgame: false,
            trackers: Vec::new(),
            piece_deadlines: BTreeMap::new(),
            file_priorities: Vec::new(),
            finished_pieces: BTreeSet::new(),
        };
        for tracker in trackers {
            record.add_tracker(tracker);
        }
        if let Some(info) = metadata {
            record.set_metadata(info)?;
        }
        Ok(record)
    }

    /// Installs metadata; snapshots whose file table and pieces disagree are rejected.
    pub(super) fn set_metadata(&mut self, info: TorrentInfo) -> NativeResult<()> {
        if !info.is_consistent() {
            return Err(NativeError::InvalidInput {
                field: "metadata",
                reason: "file table does not match piece geometry",
            });
        }
        self.info_hash = info.info_hash;
        if self.name.is_none() {
            self.name = Some(info.name.clone());
        }
        self.file_priorities = vec![FilePriority::Default; info.files.len()];
        self.finished_pieces.retain(|piece| *piece < info.num_pieces);
        self.metadata = Some(Arc::new(info));
        self.recompute_state();
        Ok(())
    }

    /// Adds a tracker unless one with the same URL is present.
    pub(super) fn add_tracker(&mut self, tracker: TrackerEntry) {
        if self.trackers.iter().any(|existing| existing.url == tracker.url) {
            debug!(url = %tracker.url, "tracker already attached");
            return;
        }
        self.trackers.push(tracker);
    }

    pub(super) fn metadata(&self) -> NativeResult<&Arc<TorrentInfo>> {
        self.metadata.as_ref().ok_or(NativeError::MissingMetadata)
    }

    pub(super) fn check_piece(&self, piece: u32) -> NativeResult<()> {
        let pieces = self.metadata()?.num_pieces;
        if piece < pieces {
            Ok(())
        } else {
            Err(NativeError::OutOfRange {
                field: "piece",
                value: u64::from(piece),
                limit: u64::from(pieces),
            })
        }
    }

    pub(super) fn set_file_priority(
        &mut self,
        index: u32,
        priority: FilePriority,
    ) -> NativeResult<()> {
        self.metadata()?;
        let limit = self.file_priorities.len();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|position| self.file_priorities.get_mut(position))
            .ok_or(NativeError::OutOfRange {
                field: "file_index",
                value: u64::from(index),
                limit: limit as u64,
            })?;
        *slot = priority;
        self.recompute_state();
        Ok(())
    }

    pub(super) fn ignore_all_files(&mut self) -> NativeResult<()> {
        self.metadata()?;
        self.file_priorities.fill(FilePriority::DontDownload);
        self.recompute_state();
        Ok(())
    }

    pub(super) fn finish_piece(&mut self, piece: u32) -> NativeResult<()> {
        self.check_piece(piece)?;
        self.finished_pieces.insert(piece);
        self.piece_deadlines.remove(&piece);
        self.recompute_state();
        Ok(())
    }

    pub(super) fn piece_deadlines(&self) -> Vec<PieceDeadline> {
        self.piece_deadlines
            .iter()
            .map(|(piece, deadline_ms)| PieceDeadline {
                piece: *piece,
                deadline_ms: *deadline_ms,
            })
            .collect()
    }

    /// Bytes of finished pieces, accounting for a shorter last piece.
    pub(super) fn bytes_downloaded(&self) -> u64 {
        let Some(info) = self.metadata.as_ref() else {
            return 0;
        };
        self.finished_pieces
            .iter()
            .filter_map(|piece| info.piece_size(*piece))
            .sum()
    }

    pub(super) fn bytes_total(&self) -> u64 {
        self.metadata.as_ref().map_or(0, |info| info.total_size)
    }

    /// Finished bytes per file, in file order.
    pub(super) fn file_progress(&self) -> Vec<u64> {
        let Some(info) = self.metadata.as_ref() else {
            return Vec::new();
        };
        let piece_length = u64::from(info.piece_length);
        info.files
            .iter()
            .map(|file| {
                let file_end = file.offset.saturating_add(file.size);
                self.finished_pieces
                    .iter()
                    .map(|piece| {
                        let start = u64::from(*piece).saturating_mul(piece_length);
                        let end = start.saturating_add(info.piece_size(*piece).unwrap_or(0));
                        end.min(file_end).saturating_sub(start.max(file.offset))
                    })
                    .sum()
            })
            .collect()
    }

    /// Derives the state code from metadata, selection and finished pieces.
    fn recompute_state(&mut self) {
        let Some(info) = self.metadata.as_ref() else {
            self.state = TorrentState::DownloadingMetadata;
            return;
        };

        if self.finished_pieces.len() as u64 == u64::from(info.num_pieces) {
            self.state = TorrentState::Seeding;
            return;
        }

        let wanted_done = info.files.iter().all(|file| {
            let wanted = self
                .file_priorities
                .get(file.index as usize)
                .copied()
                .unwrap_or_default()
                .is_wanted();
            !wanted
                || info.file_pieces(file.index).is_none_or(|mut pieces| {
                    pieces.all(|piece| self.finished_pieces.contains(&piece))
                })
        });
        self.state = if wanted_done {
            TorrentState::Finished
        } else {
            TorrentState::Downloading
        };
    }

    pub(super) fn magnet_uri(&self) -> String {
        let name = self
            .metadata
            .as_ref()
            .map(|info| info.name.clone())
            .or_else(|| self.name.clone())
            .unwrap_or_default();
        MagnetLink::new(self.info_hash)
            .with_name(name)
            .with_trackers(&self.trackers)
            .to_string()
    }

    pub(super) fn resume_payload(&self) -> String {
        json!({
            "info_hash": self.info_hash,
            "name": self.name,
            "paused": self.paused,
            "endgame": self.endgame,
            "trackers": self.trackers,
            "piece_deadlines": self.piece_deadlines(),
            "file_priorities": self.file_priorities,
            "finished_pieces": self.finished_pieces,
        })
        .to_string()
    }
}
