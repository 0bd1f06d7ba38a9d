//! Fixed-format wire codec for the GPIO daemon protocol.
//!
//! Every exchange on the wire has a fixed shape:
//! - A 16-byte command header (`opcode`, `p1`, `p2`, `p3`), optionally followed
//!   by `p3` extension bytes
//! - A 16-byte response whose last word is the signed result
//! - A 12-byte notification record on the notification connection
//!
//! All fields are little-endian. Decoding never interprets a buffer of the
//! wrong size.

pub mod codec;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_command_header, decode_notification, decode_response, encode_command,
    encode_notification, encode_response, u2i, Command, CommandHeader, Extension, FrameConfig,
    NotificationKind, NotificationRecord, Response, COMMAND_HEADER_SIZE, DEFAULT_MAX_PAYLOAD,
    NOTIFICATION_SIZE, NTFY_FLAGS_ALIVE, NTFY_FLAGS_EVENT, NTFY_FLAGS_LINE, NTFY_FLAGS_WDOG,
    RESPONSE_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
