use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// A connected daemon stream. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations. Both
/// the control and the notification connection are `DaemonStream`s.
pub struct DaemonStream {
    inner: TcpStream,
}

impl Read for DaemonStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for DaemonStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl DaemonStream {
    /// Wrap an already connected TCP stream.
    ///
    /// Disables send coalescing so that small fixed-size commands are not
    /// held back by Nagle's algorithm.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { inner: stream })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Address of the daemon this stream is connected to.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Whether `TCP_NODELAY` is active.
    pub fn nodelay(&self) -> Result<bool> {
        self.inner.nodelay().map_err(Into::into)
    }

    /// Shut down both directions of the connection.
    ///
    /// Any thread blocked reading from a clone of this stream wakes up with
    /// end-of-stream. Calling this more than once is harmless.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => {
                debug!("daemon stream shut down");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for DaemonStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonStream")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn pair() -> (DaemonStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        let client = DaemonStream::from_tcp(client.join().unwrap()).unwrap();
        (client, server)
    }

    #[test]
    fn from_tcp_enables_nodelay() {
        let (client, _server) = pair();
        assert!(client.nodelay().unwrap());
    }

    #[test]
    fn shutdown_unblocks_reader_on_clone() {
        let (client, _server) = pair();
        let mut reader = client.try_clone().unwrap();

        let blocked = thread::spawn(move || {
            let mut buf = [0u8; 12];
            reader.read(&mut buf).unwrap()
        });

        thread::sleep(Duration::from_millis(20));
        client.shutdown().unwrap();

        assert_eq!(blocked.join().unwrap(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (client, server) = pair();
        client.shutdown().unwrap();
        drop(server);
        client.shutdown().unwrap();
    }

    #[test]
    fn read_write_passthrough() {
        let (mut client, mut server) = pair();
        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").unwrap();
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }
}
