//! Display protocol core implementation
//!
//! This module provides the wire header, message payloads, and framing used
//! between a renderer and a display driver server.

pub mod codec;
mod error;
mod header;
mod message;
pub mod metrics;
mod types;

pub use codec::{encode_frame, read_header, read_payload, write_frame};
pub use error::{Error, Result};
pub use header::Header;
pub use message::{
    BOX_ENTRY, CHANNEL_NAMES_ENTRY, DATA_ENTRY, DATA_WINDOW_ENTRY, DISPLAY_WINDOW_ENTRY, ImageData,
    Message, OpenParameters, PARAMETERS_ENTRY,
};
pub use metrics::{MetricsSnapshot, snapshot as metrics_snapshot};
pub use types::MessageType;

/// Display protocol magic byte
pub const MAGIC_NUMBER: u8 = 0x42;

/// Current protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 7;

/// Default ceiling on a single payload (256 MB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;
