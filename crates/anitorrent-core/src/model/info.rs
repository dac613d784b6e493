//! Torrent metadata snapshot exposed through handle info views.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// SHA-1 info hash identifying a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Wrap raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex encoding, as used in magnet links.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Error returned when an info hash string cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid info hash")]
pub struct InfoHashParseError {
    /// Offending input.
    pub input: String,
}

impl FromStr for InfoHash {
    type Err = InfoHashParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0_u8; 20];
        hex::decode_to_slice(value, &mut bytes).map_err(|_| InfoHashParseError {
            input: value.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Position in the torrent's file list.
    pub index: u32,
    /// File name without directories, e.g. `01.mp4`.
    pub name: String,
    /// Path relative to the torrent root, e.g. `TV/01.mp4`.
    pub path_in_torrent: String,
    /// Byte offset of the file within the torrent's concatenated payload.
    pub offset: u64,
    /// File length in bytes.
    pub size: u64,
}

/// Read-only metadata snapshot of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Torrent display name.
    pub name: String,
    /// Info hash.
    pub info_hash: InfoHash,
    /// Sum of all file sizes.
    pub total_size: u64,
    /// Nominal piece length in bytes.
    pub piece_length: u32,
    /// Number of pieces.
    pub num_pieces: u32,
    /// Files in torrent order.
    pub files: Vec<FileEntry>,
}

impl TorrentInfo {
    /// Build a snapshot from `(path_in_torrent, size)` pairs, deriving offsets and piece count.
    ///
    /// A zero `piece_length` yields a snapshot with no pieces.
    #[must_use]
    pub fn from_files<I, P>(
        name: impl Into<String>,
        info_hash: InfoHash,
        piece_length: u32,
        files: I,
    ) -> Self
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<String>,
    {
        let mut offset = 0_u64;
        let mut entries = Vec::new();
        for (index, (path, size)) in files.into_iter().enumerate() {
            let path_in_torrent: String = path.into();
            let name = path_in_torrent
                .rsplit('/')
                .next()
                .unwrap_or(&path_in_torrent)
                .to_string();
            entries.push(FileEntry {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                name,
                path_in_torrent,
                offset,
                size,
            });
            offset = offset.saturating_add(size);
        }

        let num_pieces = if piece_length == 0 {
            0
        } else {
            u32::try_from(offset.div_ceil(u64::from(piece_length))).unwrap_or(u32::MAX)
        };

        Self {
            name: name.into(),
            info_hash,
            total_size: offset,
            piece_length,
            num_pieces,
            files: entries,
        }
    }

    /// Look up a file by index.
    #[must_use]
    pub fn file(&self, index: u32) -> Option<&FileEntry> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.files.get(index))
    }

    /// Whether the file table and piece geometry agree with each other.
    ///
    /// Files must be listed in order, back to back, summing to `total_size`,
    /// and `num_pieces` must be exactly the pieces needed to cover it.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut offset = 0_u64;
        for (position, file) in self.files.iter().enumerate() {
            if usize::try_from(file.index).ok() != Some(position) || file.offset != offset {
                return false;
            }
            let Some(end) = offset.checked_add(file.size) else {
                return false;
            };
            offset = end;
        }
        if offset != self.total_size {
            return false;
        }

        if self.piece_length == 0 {
            return self.num_pieces == 0 && self.total_size == 0;
        }
        u64::from(self.num_pieces) == self.total_size.div_ceil(u64::from(self.piece_length))
    }

    /// Size of a piece; the last piece may be shorter than `piece_length`.
    #[must_use]
    pub fn piece_size(&self, piece: u32) -> Option<u64> {
        if piece >= self.num_pieces {
            return None;
        }
        let start = u64::from(piece).saturating_mul(u64::from(self.piece_length));
        Some(
            self.total_size
                .saturating_sub(start)
                .min(u64::from(self.piece_length)),
        )
    }

    /// Pieces holding any byte of the given file.
    ///
    /// The first and last piece may also hold bytes of neighbouring files.
    /// Empty files map to no pieces.
    #[must_use]
    pub fn file_pieces(&self, index: u32) -> Option<RangeInclusive<u32>> {
        let file = self.file(index)?;
        if file.size == 0 || self.piece_length == 0 {
            return None;
        }
        let piece_length = u64::from(self.piece_length);
        let first = file.offset / piece_length;
        let last = file.offset.saturating_add(file.size - 1) / piece_length;
        Some(u32::try_from(first).ok()?..=u32::try_from(last).ok()?)
    }
}
