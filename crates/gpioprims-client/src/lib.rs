//! Client-side protocol engine for a remote GPIO daemon.
//!
//! This is the layer applications use. A [`Client`] owns two connections:
//! the control connection, where commands are paired with their responses
//! one at a time through a [`CommandChannel`], and the notification
//! connection, where a [`NotificationLoop`] turns level-change records into
//! calls on the handlers registered with a [`CallbackRegistry`].

pub mod channel;
pub mod client;
pub mod commands;
pub mod config;
pub mod daemon_error;
pub mod debounce;
pub mod error;
pub mod notify;
pub mod registry;

#[cfg(test)]
mod testing;

pub use channel::{check, CommandChannel};
pub use client::Client;
pub use commands::{Mode, ScriptState, ScriptStatus, MAX_SCRIPT_PARAMS};
pub use config::{ClientConfig, ErrorMode, MaskPolicy};
pub use daemon_error::{error_text, DaemonError};
pub use debounce::{elapsed_ticks, Debounce, DEFAULT_THRESHOLD_TICKS};
pub use error::{ClientError, Result};
pub use notify::{Completion, LoopState, NotificationLoop};
pub use registry::{
    CallbackHandle, CallbackRegistry, Edge, HandlerResult, Level, LineEvent, LineHandler,
    MaskSink, MAX_LINE,
};
