//! displaywire - Versioned typed-value persistence and a display driver server
//!
//! A renderer streams finished pixels to a remote display process. Every
//! protocol payload is a set of typed values persisted into an in-memory
//! indexed container, so the same persistence layer that writes values to
//! disk also carries them over the wire.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use displaywire::data::{Box2i, CompoundMap};
//! use displaywire::driver::{ClientDisplayDriver, DisplayDriver, DriverFactory, ImageStore};
//! use displaywire::protocol::OpenParameters;
//! use displaywire::server::DisplayDriverServer;
//!
//! // Serve images into an in-memory store
//! let store = ImageStore::new();
//! let mut factory = DriverFactory::new();
//! store.register_driver(&mut factory);
//! factory.set_default("ImageDisplayDriver");
//! let server = DisplayDriverServer::with_port(0, factory)?;
//!
//! // Send one 2x2 single-channel image
//! let window = Box2i::from_coords(0, 0, 1, 1);
//! let open = OpenParameters {
//!     display_window: window,
//!     data_window: window,
//!     channel_names: vec!["Y".to_string()],
//!     parameters: CompoundMap::new(),
//! };
//! let mut driver = ClientDisplayDriver::connect(("127.0.0.1", server.port()), &open)?;
//! driver.image_data(&window, &[0.0, 0.25, 0.5, 1.0])?;
//! driver.image_close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - **Copy-on-write typed values** - shared storage, duplicated on first write
//! - **Self-describing containers** - `XXHash3` checked, legacy layouts still load
//! - **Display protocol** - 7-byte framed Open/Data/Close/Exception messages
//! - **Background server** - single-threaded reactor, one pending accept

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod data;
pub mod driver;
pub mod indexed_io;
pub mod protocol;
pub mod server;

pub use data::{Data, TypedData};
pub use driver::{DisplayDriver, DriverFactory};
pub use indexed_io::{IndexedIo, MemoryIndexedIo};
pub use protocol::{Error, Header, Message, MessageType, Result};
pub use server::{DisplayDriverServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default display driver server port
pub const DEFAULT_PORT: u16 = 1559;
