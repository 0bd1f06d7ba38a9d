/// Errors that can occur during encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A buffer did not have the exact size its layout requires.
    #[error("invalid {what} length ({actual} bytes, expected {expected})")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Text extension contains a character that has no single-byte encoding.
    #[error("character {0:?} cannot be encoded as a single byte")]
    InvalidText(char),

    /// An I/O error occurred while reading or writing.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete record was received.
    #[error("connection closed (incomplete record)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
