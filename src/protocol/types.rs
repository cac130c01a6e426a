//! Display protocol message types

use std::fmt;

/// Display protocol message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Open an image; the reply carries the scan-line-order flag
    Open = 1,
    /// Pixel region for an open image
    Data = 2,
    /// Finish the image; the reply has an empty payload
    Close = 3,
    /// Failure text, sent by the server before it closes
    Exception = 4,
}

impl MessageType {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Open),
            2 => Some(Self::Data),
            3 => Some(Self::Close),
            4 => Some(Self::Exception),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the server answers this message type
    #[must_use]
    pub const fn requires_response(self) -> bool {
        matches!(self, Self::Open | Self::Close)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "Open",
            Self::Data => "Data",
            Self::Close => "Close",
            Self::Exception => "Exception",
        };
        write!(f, "{name}")
    }
}
