//! Error types for DAT archive operations

use std::io;
use thiserror::Error;

/// DAT operation result type
pub type DatResult<T> = Result<T, DatError>;

/// Errors raised while opening archives or reading entry streams
#[derive(Debug, Error)]
pub enum DatError {
    /// I/O error on the archive file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// File too short to hold the required structure
    #[error("Archive truncated: need at least {expected} bytes, file has {actual}")]
    Truncated {
        /// Minimum number of bytes required
        expected: u64,
        /// Actual file size
        actual: u64,
    },

    /// Footer sizes do not fit inside the file
    #[error("Invalid footer: {reason}")]
    InvalidFooter {
        /// Detailed description of the inconsistency
        reason: String,
    },

    /// An entry record is truncated or points outside the archive
    #[error("Invalid entry {index}: {reason}")]
    InvalidEntry {
        /// Position of the entry in the table
        index: usize,
        /// Detailed description of the problem
        reason: String,
    },

    /// The entry table is not in case-insensitive path order
    #[error("Entries not sorted: {previous:?} precedes {next:?}")]
    UnsortedEntries {
        /// Path of the earlier entry
        previous: String,
        /// Path of the entry that sorts before it
        next: String,
    },

    /// No entry with this path
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Write access was requested for an archive entry
    #[error("Archive entries are read-only: {0}")]
    ReadOnly(String),

    /// The compressed payload is corrupt or ended early
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Text-mode streams only support rewinding
    #[error("Text-mode streams can only seek to the start")]
    UnsupportedSeek,

    /// Seek target before the start or past the end of the entry
    #[error("Seek target {target} outside entry of {size} bytes")]
    SeekOutOfRange {
        /// Requested absolute position
        target: i128,
        /// Uncompressed entry size
        size: u64,
    },

    /// A previous read failed; the stream must be rewound
    #[error("Stream is in an error state")]
    StreamFailed,
}

impl DatError {
    /// Check if this error means the archive itself is malformed
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::BinRead(_)
                | Self::Truncated { .. }
                | Self::InvalidFooter { .. }
                | Self::InvalidEntry { .. }
                | Self::UnsortedEntries { .. }
        )
    }

    /// Check if this error leaves the stream in its sticky error state
    pub fn is_stream_failure(&self) -> bool {
        matches!(self, Self::Decompression(_) | Self::StreamFailed)
    }

    /// Check if the operation is not supported on archive streams
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::ReadOnly(_) | Self::UnsupportedSeek)
    }

    /// Check if the entry simply does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::EntryNotFound(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<DatError> for io::Error {
    fn from(err: DatError) -> Self {
        let kind = match &err {
            DatError::Io(e) => return Self::new(e.kind(), err),
            DatError::EntryNotFound(_) => io::ErrorKind::NotFound,
            DatError::ReadOnly(_) => io::ErrorKind::PermissionDenied,
            DatError::UnsupportedSeek => io::ErrorKind::Unsupported,
            DatError::SeekOutOfRange { .. } => io::ErrorKind::InvalidInput,
            DatError::Truncated { .. } => io::ErrorKind::UnexpectedEof,
            DatError::BinRead(_)
            | DatError::InvalidFooter { .. }
            | DatError::InvalidEntry { .. }
            | DatError::UnsortedEntries { .. }
            | DatError::Decompression(_)
            | DatError::StreamFailed => io::ErrorKind::InvalidData,
        };
        Self::new(kind, err)
    }
}
