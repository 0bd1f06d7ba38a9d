use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::DaemonStream;

/// Port the GPIO daemon listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8888;

/// Host used when no daemon address is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// TCP transport to the GPIO daemon.
///
/// Stateless: every call opens a fresh connection. The client opens one for
/// commands and a second one for notifications against the same address.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to the daemon (blocking, no timeout).
    pub fn connect(addr: &str) -> Result<DaemonStream> {
        Self::connect_with(addr, None)
    }

    /// Connect to the daemon, giving up after `timeout` per resolved address.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<DaemonStream> {
        Self::connect_with(addr, Some(timeout))
    }

    fn connect_with(addr: &str, timeout: Option<Duration>) -> Result<DaemonStream> {
        let candidates = resolve(addr)?;

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    info!(%candidate, "connected to gpio daemon");
                    return DaemonStream::from_tcp(stream);
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }),
        })
    }
}

/// Format a `host:port` pair, bracketing bare IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn resolve(addr: &str) -> Result<Vec<SocketAddr>> {
    let resolved: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect();
    Ok(resolved)
}
