use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use gpioprims_transport::DaemonStream;

use crate::codec::{
    decode_notification, decode_response, FrameConfig, NotificationRecord, Response,
    NOTIFICATION_SIZE, RESPONSE_SIZE,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Reads fixed-size records from any `Read` stream.
///
/// Handles short reads internally; callers always get complete records.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next 16-byte response (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_response(&mut self) -> Result<Response> {
        let raw = self.read_exact_bytes(RESPONSE_SIZE)?;
        decode_response(&raw)
    }

    /// Read a length-announced payload following a response (blocking).
    pub fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        self.read_exact_bytes(len)
    }

    /// Read the next 12-byte notification record (blocking).
    pub fn read_notification(&mut self) -> Result<NotificationRecord> {
        let raw = self.read_exact_bytes(NOTIFICATION_SIZE)?;
        decode_notification(&raw)
    }

    fn read_exact_bytes(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Number of bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<DaemonStream> {
    /// Create a reader for `DaemonStream` and apply read timeout from config.
    pub fn with_config_daemon(inner: DaemonStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: gpioprims_transport::TransportError) -> FrameError {
    match err {
        gpioprims_transport::TransportError::Io(io) => FrameError::Io(io),
        gpioprims_transport::TransportError::Resolve { source, .. }
        | gpioprims_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
