use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use gpioprims_transport::DaemonStream;
use tracing::trace;

use crate::codec::{encode_command, Command, FrameConfig};
use crate::error::{FrameError, Result};
use crate::opcode::opcode_name;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete commands to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a command, header and extension in one write.
    pub fn send(&mut self, cmd: &Command) -> Result<()> {
        self.buf.clear();
        encode_command(cmd, &mut self.buf)?;
        trace!(
            opcode = opcode_name(cmd.opcode),
            p1 = cmd.p1,
            p2 = cmd.p2,
            p3 = cmd.p3(),
            "sending command"
        );

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<DaemonStream> {
    /// Create a writer for `DaemonStream` and apply write timeout from config.
    pub fn with_config_daemon(inner: DaemonStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
