//! Client for remote GPIO daemons speaking the pigpio socket protocol.
//!
//! gpioprims talks to the daemon over two TCP connections: one for
//! request/response commands and one for line-change notifications that are
//! dispatched to registered callbacks.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connections to the daemon
//! - [`wire`]: Fixed-size command, response and notification codec
//! - [`client`]: Command channel, notification loop and callbacks (behind
//!   the `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use gpioprims_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use gpioprims_wire::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use gpioprims_client::*;
}
