//! TCP transport to a remote GPIO daemon.
//!
//! This is the lowest layer of gpioprims. It opens the control and
//! notification connections and hands out [`DaemonStream`] values that the
//! wire and client layers read from and write to.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::DaemonStream;
pub use tcp::{join_host_port, TcpTransport, DEFAULT_HOST, DEFAULT_PORT};
