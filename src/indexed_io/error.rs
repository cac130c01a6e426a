//! Indexed container error types

use thiserror::Error;

/// Errors raised by indexed containers and their serialized form
#[derive(Error, Debug)]
pub enum IndexedIoError {
    /// No entry with this name in the current directory
    #[error("entry not found: {path}")]
    NotFound {
        /// Full path of the missing entry
        path: String,
    },

    /// Entry exists but is a file where a directory was required
    #[error("entry is not a directory: {path}")]
    NotADirectory {
        /// Full path of the entry
        path: String,
    },

    /// Entry exists but is a directory where a file was required
    #[error("entry is a directory: {path}")]
    IsADirectory {
        /// Full path of the entry
        path: String,
    },

    /// Entry holds a different kind of data than requested
    #[error("entry {path} holds {found}, expected {expected}")]
    TypeMismatch {
        /// Full path of the entry
        path: String,
        /// Requested data kind
        expected: &'static str,
        /// Stored data kind
        found: &'static str,
    },

    /// Entry names must be non-empty and must not contain `/`
    #[error("invalid entry name: {name:?}")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Attempted to move above the root directory
    #[error("already at the root directory")]
    AtRoot,

    /// Serialized container does not start with the container magic
    #[error("invalid container magic: {found:?}")]
    InvalidMagic {
        /// Bytes found in place of the magic
        found: [u8; 4],
    },

    /// Serialized container was written by a newer format version
    #[error("unsupported container version {found} (max {max})")]
    UnsupportedVersion {
        /// Version found in the buffer
        found: u16,
        /// Newest version this build can read
        max: u16,
    },

    /// Trailing checksum does not match the content
    #[error("container checksum mismatch: expected {expected:#x}, got {found:#x}")]
    ChecksumMismatch {
        /// Checksum computed over the content
        expected: u64,
        /// Checksum stored in the buffer
        found: u64,
    },

    /// Buffer ended before the structure was complete
    #[error("container truncated: need {needed} more bytes, got {got}")]
    Truncated {
        /// Bytes required by the next field
        needed: usize,
        /// Bytes left in the buffer
        got: usize,
    },

    /// Unknown node kind byte
    #[error("invalid node kind: {0:#x}")]
    InvalidNodeKind(u8),

    /// Unknown entry data tag
    #[error("invalid entry data tag: {0:#x}")]
    InvalidDataTag(u8),

    /// Directory nesting exceeds the decoder limit
    #[error("directory nesting deeper than {max} levels")]
    TooDeep {
        /// Maximum supported depth
        max: usize,
    },

    /// Bytes left over after the root directory
    #[error("{count} trailing bytes after container content")]
    TrailingBytes {
        /// Number of unconsumed bytes
        count: usize,
    },

    /// Invalid UTF-8 in a name or string entry
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexedIoError>;
