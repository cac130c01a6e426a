//! Display protocol error types

use thiserror::Error;

use crate::data::DataError;
use crate::driver::DriverError;
use crate::indexed_io::IndexedIoError;

/// Display protocol errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid magic byte
    #[error("invalid magic byte: expected 0x42, got {found:#x}")]
    InvalidMagic {
        /// Found magic byte
        found: u8,
    },

    /// Unsupported protocol version
    #[error("unsupported protocol version: {found}")]
    UnsupportedVersion {
        /// Found version byte
        found: u8,
    },

    /// Invalid message type
    #[error("invalid message type: {type_byte:#x}")]
    InvalidMessageType {
        /// Invalid type byte
        type_byte: u8,
    },

    /// Payload too large
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Message arrived in a state that does not accept it
    #[error("unexpected {found} message: {reason}")]
    UnexpectedMessage {
        /// Received message type
        found: super::MessageType,
        /// Why it was rejected
        reason: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload held a value of the wrong shape
    #[error(transparent)]
    Data(#[from] DataError),

    /// Payload container could not be decoded
    #[error(transparent)]
    IndexedIo(#[from] IndexedIoError),

    /// Display driver failure
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Exception frame received from the peer
    #[error("remote exception: {0}")]
    Remote(String),

    /// Invalid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Whether the error comes from the application rather than the wire.
    ///
    /// Application errors are reported to the peer in an Exception frame;
    /// everything else closes the connection without a reply.
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Data(_) | Self::IndexedIo(_) | Self::Driver(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
