//! Enumerations and value types shared by the handle proxy and engines.

mod info;

pub use info::{FileEntry, InfoHash, InfoHashParseError, TorrentInfo};

use serde::{Deserialize, Serialize};

use crate::error::{HandleError, HandleResult};

/// Outcome of reloading a torrent's file layout into its handle.
///
/// Discriminants are part of the interop surface and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum ReloadFileResult {
    /// Metadata was reloaded into the handle.
    Success = 0,
    /// The handle is not attached to a live torrent.
    NullHandle = 1,
    /// The torrent has no metadata to reload yet.
    NullFile = 2,
}

impl ReloadFileResult {
    /// Every member, in discriminant order.
    pub const ALL: [Self; 3] = [Self::Success, Self::NullHandle, Self::NullFile];

    /// Raw discriminant carried across interop boundaries.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Symbolic name used by existing callers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "kReloadFileSuccess",
            Self::NullHandle => "kReloadFileNullHandle",
            Self::NullFile => "kReloadFileNullFile",
        }
    }

    /// Convert the outcome into a result, mapping failures to their error kinds.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::InvalidHandleOnReload`] or
    /// [`HandleError::InvalidFileOnReload`] for the failing outcomes.
    pub const fn into_result(self) -> HandleResult<()> {
        match self {
            Self::Success => Ok(()),
            Self::NullHandle => Err(HandleError::InvalidHandleOnReload),
            Self::NullFile => Err(HandleError::InvalidFileOnReload),
        }
    }
}

impl TryFrom<i32> for ReloadFileResult {
    type Error = HandleError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::NullHandle),
            2 => Ok(Self::NullFile),
            other => Err(HandleError::UnknownDiscriminant {
                kind: "reload_file_result",
                value: other,
            }),
        }
    }
}

impl From<ReloadFileResult> for i32 {
    fn from(result: ReloadFileResult) -> Self {
        result.code()
    }
}

impl std::fmt::Display for ReloadFileResult {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Torrent state codes reported by libtorrent-compatible engines.
///
/// The handle proxy treats the raw code as opaque; this type decodes the
/// codes the in-process engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Verifying existing data on disk.
    CheckingFiles,
    /// Waiting for metadata from peers (magnet adds).
    DownloadingMetadata,
    /// Downloading payload.
    Downloading,
    /// All wanted pieces are present.
    Finished,
    /// Every piece is present and the torrent is uploading.
    Seeding,
    /// Validating loaded resume data.
    CheckingResumeData,
}

impl TorrentState {
    /// Decode a raw state code; unknown codes are not guessed.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::CheckingFiles),
            2 => Some(Self::DownloadingMetadata),
            3 => Some(Self::Downloading),
            4 => Some(Self::Finished),
            5 => Some(Self::Seeding),
            7 => Some(Self::CheckingResumeData),
            _ => None,
        }
    }

    /// Raw state code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::CheckingFiles => 1,
            Self::DownloadingMetadata => 2,
            Self::Downloading => 3,
            Self::Finished => 4,
            Self::Seeding => 5,
            Self::CheckingResumeData => 7,
        }
    }
}

/// Per-file download priority using libtorrent's priority values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FilePriority {
    /// The file is not downloaded.
    DontDownload = 0,
    /// Lowest priority for wanted files.
    Low = 1,
    /// Priority assigned to newly added files.
    #[default]
    Default = 4,
    /// Highest priority.
    Top = 7,
}

impl FilePriority {
    /// Raw priority value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Whether the file will be downloaded at all.
    #[must_use]
    pub const fn is_wanted(self) -> bool {
        !matches!(self, Self::DontDownload)
    }
}

impl TryFrom<u8> for FilePriority {
    type Error = HandleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::DontDownload),
            1 => Ok(Self::Low),
            4 => Ok(Self::Default),
            7 => Ok(Self::Top),
            other => Err(HandleError::UnknownDiscriminant {
                kind: "file_priority",
                value: i32::from(other),
            }),
        }
    }
}

impl From<FilePriority> for u8 {
    fn from(priority: FilePriority) -> Self {
        priority.value()
    }
}

/// Tracker endpoint attached to a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEntry {
    /// Announce URL.
    pub url: String,
    /// Tier; lower tiers are announced to first.
    pub tier: u8,
    /// Consecutive failures tolerated before the tracker is skipped (0 = unlimited).
    pub fail_limit: u8,
}

/// Soft deadline for fetching a piece, in milliseconds from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceDeadline {
    /// Piece index.
    pub piece: u32,
    /// Deadline in milliseconds.
    pub deadline_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_result_round_trips_every_member() {
        for result in ReloadFileResult::ALL {
            let decoded = ReloadFileResult::try_from(result.code()).expect("known discriminant");
            assert_eq!(decoded, result);
        }
        assert_eq!(ReloadFileResult::Success.code(), 0);
        assert_eq!(ReloadFileResult::NullHandle.code(), 1);
        assert_eq!(ReloadFileResult::NullFile.code(), 2);
    }

    #[test]
    fn reload_result_rejects_unknown_discriminants() {
        for value in [-1, 3, 42, i32::MAX] {
            match ReloadFileResult::try_from(value) {
                Err(HandleError::UnknownDiscriminant { kind, value: got }) => {
                    assert_eq!(kind, "reload_file_result");
                    assert_eq!(got, value);
                }
                other => panic!("expected unknown discriminant, got {other:?}"),
            }
        }
    }

    #[test]
    fn reload_result_maps_failures_to_error_kinds() {
        assert!(ReloadFileResult::Success.into_result().is_ok());
        assert!(matches!(
            ReloadFileResult::NullHandle.into_result(),
            Err(HandleError::InvalidHandleOnReload)
        ));
        assert!(matches!(
            ReloadFileResult::NullFile.into_result(),
            Err(HandleError::InvalidFileOnReload)
        ));
    }

    #[test]
    fn reload_result_serializes_as_discriminant() {
        let json = serde_json::to_string(&ReloadFileResult::NullFile).expect("serialize");
        assert_eq!(json, "2");
        let decoded: ReloadFileResult = serde_json::from_str("1").expect("deserialize");
        assert_eq!(decoded, ReloadFileResult::NullHandle);
        assert!(serde_json::from_str::<ReloadFileResult>("5").is_err());
    }

    #[test]
    fn reload_result_displays_interop_names() {
        assert_eq!(ReloadFileResult::Success.to_string(), "kReloadFileSuccess");
        assert_eq!(
            ReloadFileResult::NullHandle.to_string(),
            "kReloadFileNullHandle"
        );
    }

    #[test]
    fn state_codes_decode_known_values_only() {
        for state in [
            TorrentState::CheckingFiles,
            TorrentState::DownloadingMetadata,
            TorrentState::Downloading,
            TorrentState::Finished,
            TorrentState::Seeding,
            TorrentState::CheckingResumeData,
        ] {
            assert_eq!(TorrentState::from_code(state.code()), Some(state));
        }
        assert_eq!(TorrentState::from_code(0), None);
        assert_eq!(TorrentState::from_code(6), None);
    }

    #[test]
    fn file_priority_rejects_unmapped_values() {
        assert_eq!(FilePriority::try_from(7).ok(), Some(FilePriority::Top));
        assert!(FilePriority::try_from(3).is_err());
        assert!(!FilePriority::DontDownload.is_wanted());
        assert_eq!(FilePriority::default(), FilePriority::Default);
    }
}
