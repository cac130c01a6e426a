//! Display protocol frame header
//!
//! Every frame starts with a fixed 7-byte header.

use super::{Error, HEADER_SIZE, MAGIC_NUMBER, MessageType, PROTOCOL_VERSION, Result};

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 1;
const TYPE_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 3;

/// Display protocol frame header (7 bytes)
///
/// # Wire Format
///
/// ```text
/// +-------+---------+------+----------------------------+
/// | magic | version | type | payload length (u32 LE)    |
/// |  (1)  |   (1)   | (1)  |            (4)             |
/// +-------+---------+------+----------------------------+
/// ```
///
/// A header is kept as raw bytes so a malformed one read off the wire can
/// still be inspected and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header([u8; HEADER_SIZE]);

impl Header {
    /// Create a header for a frame with `payload_len` payload bytes
    #[must_use]
    pub fn new(msg_type: MessageType, payload_len: u32) -> Self {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[MAGIC_OFFSET] = MAGIC_NUMBER;
        bytes[VERSION_OFFSET] = PROTOCOL_VERSION;
        bytes[TYPE_OFFSET] = msg_type.as_u8();
        bytes[LENGTH_OFFSET..].copy_from_slice(&payload_len.to_le_bytes());
        Self(bytes)
    }

    /// Wrap raw header bytes without validating them
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse and validate the first [`HEADER_SIZE`] bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            })?;
        let header = Self(raw);
        header.validate()?;
        Ok(header)
    }

    /// Raw header bytes
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.0
    }

    /// Get magic byte
    #[must_use]
    pub const fn magic(&self) -> u8 {
        self.0[MAGIC_OFFSET]
    }

    /// Get protocol version byte
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.0[VERSION_OFFSET]
    }

    /// Get message type byte
    #[must_use]
    pub const fn msg_type_byte(&self) -> u8 {
        self.0[TYPE_OFFSET]
    }

    /// Get message type
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.msg_type_byte())
    }

    /// Get payload length
    #[must_use]
    pub const fn payload_len(&self) -> u32 {
        u32::from_le_bytes([
            self.0[LENGTH_OFFSET],
            self.0[LENGTH_OFFSET + 1],
            self.0[LENGTH_OFFSET + 2],
            self.0[LENGTH_OFFSET + 3],
        ])
    }

    /// Check magic, version and message type, returning the type
    pub fn validate(&self) -> Result<MessageType> {
        if self.magic() != MAGIC_NUMBER {
            return Err(Error::InvalidMagic {
                found: self.magic(),
            });
        }

        if self.version() != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion {
                found: self.version(),
            });
        }

        self.message_type().ok_or(Error::InvalidMessageType {
            type_byte: self.msg_type_byte(),
        })
    }

    /// Whether [`Header::validate`] succeeds
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl Default for Header {
    fn default() -> Self {
        Self([0u8; HEADER_SIZE])
    }
}
