//! Error types for `mmlod`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `mmlod` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Archive Errors ====================
    /// The file is not a recognised archive flavour.
    #[error("unknown archive format: {path}")]
    UnknownFormat {
        /// The path that failed detection.
        path: PathBuf,
    },

    /// The archive directory is structurally invalid.
    #[error("corrupt archive index in {path}: {reason}")]
    CorruptIndex {
        /// The archive path.
        path: PathBuf,
        /// What is wrong with the directory.
        reason: String,
    },

    /// An individual entry's data is invalid or out of range.
    #[error("corrupt entry '{name}': {reason}")]
    CorruptEntry {
        /// The entry name.
        name: String,
        /// What is wrong with the entry.
        reason: String,
    },

    /// An entry name does not fit the flavour's directory record.
    #[error("file name '{name}' length exceeds {limit} symbols")]
    NameTooLong {
        /// The offending name.
        name: String,
        /// The flavour's name field width (including the NUL terminator).
        limit: usize,
    },

    /// The decompressor produced the wrong number of bytes or overran its
    /// source.
    #[error("decompression produced {actual} bytes, expected {expected}")]
    DecompressionMismatch {
        /// Declared unpacked size.
        expected: usize,
        /// Bytes actually produced.
        actual: usize,
    },

    // ==================== DEF Errors ====================
    /// DEF header, group table, or frame offsets violate invariants.
    #[error("invalid DEF: {0}")]
    InvalidDef(String),

    /// A mode 1/2/3 frame body overruns or underruns its row data.
    #[error("invalid pixel stream: {0}")]
    InvalidPixelStream(String),

    /// Composition or sprite decoding requested without a palette.
    #[error("palette '{0}' not available")]
    PaletteMissing(String),

    // ==================== Pixel Source Errors ====================
    /// A PCX/BMP input ended mid-record.
    #[error("unexpected end of data: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Bytes that were required.
        needed: usize,
    },

    // ==================== Usage Errors ====================
    /// Malformed argument or unsupported combination.
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Whether this error marks a structurally corrupt archive or DEF, as
    /// opposed to an environment/usage failure. The strict-errors driver
    /// maps these to its dedicated exit code.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::UnknownFormat { .. }
                | Error::CorruptIndex { .. }
                | Error::CorruptEntry { .. }
                | Error::DecompressionMismatch { .. }
                | Error::InvalidDef(_)
                | Error::InvalidPixelStream(_)
                | Error::Truncated { .. }
        )
    }
}

/// A specialized Result type for `mmlod` operations.
pub type Result<T> = std::result::Result<T, Error>;
