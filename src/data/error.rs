//! Typed value error types

use thiserror::Error;

use crate::indexed_io::IndexedIoError;

/// Errors raised by typed values and their persistence
#[derive(Error, Debug)]
pub enum DataError {
    /// The value type has no flat numeric layout
    #[error("{type_name} has no base type")]
    NoBaseType {
        /// Registry name of the typed value
        type_name: &'static str,
    },

    /// No registered type carries this name
    #[error("unknown type name: {0}")]
    UnknownTypeName(String),

    /// No registered type carries this tag
    #[error("unknown type tag: {0}")]
    UnknownTypeTag(u16),

    /// Value holds a different type than requested
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type name
        expected: &'static str,
        /// Stored type name
        found: &'static str,
    },

    /// Stored array length does not match a fixed-size aggregate
    #[error("{type_name} expects {expected} elements, found {found}")]
    ElementCount {
        /// Registry name of the typed value
        type_name: &'static str,
        /// Required element count
        expected: usize,
        /// Stored element count
        found: usize,
    },

    /// Legacy layout written by a newer io version
    #[error("unsupported {type_name} io version {found} (max {max})")]
    UnsupportedIoVersion {
        /// Registry name of the typed value
        type_name: &'static str,
        /// Version found in the container
        found: u32,
        /// Newest version this build can read
        max: u32,
    },

    /// Underlying container failure
    #[error(transparent)]
    IndexedIo(#[from] IndexedIoError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DataError>;
