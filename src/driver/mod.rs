//! Display drivers receiving image data
//!
//! A [`DisplayDriver`] is created per image from [`OpenParameters`] by a
//! [`DriverFactory`], fed pixel regions, then closed.

mod client;
mod factory;
mod image;

pub use client::{CLIENT_DRIVER_TYPE, ClientDisplayDriver, HOST_PARAMETER, PORT_PARAMETER};
pub use factory::{DRIVER_TYPE_PARAMETER, DriverCreator, DriverFactory};
pub use image::{
    HANDLE_PARAMETER, IMAGE_DRIVER_TYPE, Image, ImageDisplayDriver, ImageStore, MAX_IMAGE_VALUES,
};

use thiserror::Error;

use crate::data::Box2i;
use crate::protocol::OpenParameters;

/// Sink for the pixels of one image
pub trait DisplayDriver: Send {
    /// Whether regions must arrive top to bottom, one scan line at a time
    fn scan_line_order_only(&self) -> bool;

    /// Whether the same region may be sent more than once
    fn accepts_repeated_data(&self) -> bool {
        false
    }

    /// Store one region; `data` holds the pixels in scan-line order with
    /// channels interleaved
    fn image_data(&mut self, region: &Box2i, data: &[f32]) -> Result<()>;

    /// Finish the image
    fn image_close(&mut self) -> Result<()>;
}

/// Display driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// No creator registered under the requested name
    #[error("unknown display driver type: {0}")]
    UnknownDriverType(String),

    /// Neither the parameters nor the factory name a driver type
    #[error("no display driver type given and no default configured")]
    NoDriverType,

    /// A parameter is missing or unusable
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The image cannot be created with these windows or channels
    #[error("invalid image format: {0}")]
    InvalidFormat(String),

    /// Region does not lie inside the data window
    #[error("region {region:?} is outside the data window {data_window:?}")]
    RegionOutsideDataWindow {
        /// Received region
        region: Box2i,
        /// Window the image was opened with
        data_window: Box2i,
    },

    /// Pixel buffer length does not match the region
    #[error("expected {expected} values for region, got {found}")]
    BufferSize {
        /// Region area times channel count
        expected: usize,
        /// Received values
        found: usize,
    },

    /// Image already closed
    #[error("image already closed")]
    Closed,

    /// Failure talking to a remote display
    #[error(transparent)]
    Protocol(Box<crate::protocol::Error>),
}

impl From<crate::protocol::Error> for DriverError {
    fn from(err: crate::protocol::Error) -> Self {
        Self::Protocol(Box::new(err))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        Self::Protocol(Box::new(err.into()))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DriverError>;

fn invalid_parameter(name: &str, reason: impl Into<String>) -> DriverError {
    DriverError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Reject windows and channel lists no image can be built from
fn validate_format(open: &OpenParameters) -> Result<()> {
    if open.data_window.is_empty() {
        return Err(DriverError::InvalidFormat(format!(
            "empty data window {:?}",
            open.data_window
        )));
    }
    if open.channel_names.is_empty() {
        return Err(DriverError::InvalidFormat("no channels".into()));
    }
    Ok(())
}
