//! Display driver server
//!
//! Listens on one TCP endpoint and runs every accepted connection as a
//! [`Session`] on a single-threaded reactor owned by a background thread.
//! Exactly one accept is pending at any time.

mod config;
mod session;
mod socket;

pub use config::ServerConfig;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::Result;
use crate::driver::DriverFactory;
use session::{Session, SessionContext};

/// Server accepting display driver connections in the background.
///
/// Dropping the server stops accepting, closes the listener and joins the
/// reactor thread once in-flight sessions have finished.
#[derive(Debug)]
pub struct DisplayDriverServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DisplayDriverServer {
    /// Bind the configured endpoint and start serving.
    ///
    /// Binding errors are returned here; nothing is left running on failure.
    pub fn new(config: ServerConfig, mut factory: DriverFactory) -> Result<Self> {
        if let Some(default_driver) = &config.default_driver {
            factory.set_default(default_driver.clone());
        }

        let listener = socket::bind_listener(config.socket_addr(), config.listen_backlog)?;
        let local_addr = listener.local_addr()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;

        let context = SessionContext {
            factory: Arc::new(factory),
            max_payload_size: config.max_payload_size,
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                runtime.block_on(accept_loop(listener, context, shutdown_rx));
            })?;

        info!(%local_addr, "display driver server listening");
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Serve on `port` of every IPv4 interface with default settings
    pub fn with_port(port: u16, factory: DriverFactory) -> Result<Self> {
        Self::new(ServerConfig::with_port(port), factory)
    }

    /// Bound address, with the actual port when port `0` was requested
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

impl Drop for DisplayDriverServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // the receiver is gone if the accept loop already stopped
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("display driver server thread panicked");
            }
        }
        debug!(local_addr = %self.local_addr, "display driver server stopped");
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    context: SessionContext,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to register listener");
            return;
        }
    };

    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    socket::fix_socket_flags(&stream);
                    debug!(%peer, "connection accepted");
                    sessions.spawn(Session::new(stream, Some(peer), context.clone()).run());
                }
                Err(err) => {
                    error!(error = %err, "accept failed, no longer accepting connections");
                    break;
                }
            },
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(err) = finished {
                    error!(error = %err, "session task failed");
                }
            }
        }
    }

    drop(listener);
    while let Some(finished) = sessions.join_next().await {
        if let Err(err) = finished {
            error!(error = %err, "session task failed");
        }
    }
}
