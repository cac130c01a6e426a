//! Server settings.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::DEFAULT_PORT;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Configuration for a [`DisplayDriverServer`](super::DisplayDriverServer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_address: IpAddr,
    /// Port to listen on; `0` picks a free one.
    pub port: u16,
    /// Largest payload a client may announce in a header.
    pub max_payload_size: usize,
    /// Driver type used when Open parameters do not name one.
    pub default_driver: Option<String>,
    /// Pending connection queue length.
    pub listen_backlog: i32,
    /// Name of the background reactor thread.
    pub thread_name: String,
}

impl ServerConfig {
    /// Default configuration listening on `port`
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Address the listener binds to
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            default_driver: None,
            listen_backlog: 128,
            thread_name: "display-driver-server".to_string(),
        }
    }
}
