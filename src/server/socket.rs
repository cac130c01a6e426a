//! Listener setup and per-socket flags.

use std::io;
use std::net::{SocketAddr, TcpListener};

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tracing::warn;

/// Bind a non-blocking TCP listener with address reuse and close-on-exec.
pub(crate) fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_cloexec(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Keep accepted sockets out of child processes.
pub(crate) fn fix_socket_flags(stream: &tokio::net::TcpStream) {
    let socket = SockRef::from(stream);
    #[cfg(unix)]
    if let Err(err) = socket.set_cloexec(true) {
        warn!(error = %err, "failed to set close-on-exec");
    }
    if let Err(err) = socket.set_nodelay(true) {
        warn!(error = %err, "failed to disable Nagle");
    }
}
