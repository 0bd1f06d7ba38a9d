use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use gpioprims_transport::{DaemonStream, TcpTransport};
use gpioprims_wire::opcode::opcode_name;
use gpioprims_wire::{Command, FrameConfig, FrameReader, FrameWriter, Response};
use tracing::{debug, warn};

use crate::config::{ClientConfig, ErrorMode};
use crate::daemon_error::DaemonError;
use crate::error::{ClientError, Result};

/// Request/response pairing over the control connection.
///
/// Only one request is ever in flight. Concurrent callers queue on a ticket
/// lock and are served strictly in arrival order, so no caller can observe
/// another caller's response.
pub struct CommandChannel {
    io: Mutex<ChannelIo>,
    tickets: Mutex<Tickets>,
    turn: Condvar,
    // Clone of the socket kept outside `io`, so `close` never waits for the
    // caller that is blocked in a read.
    control: DaemonStream,
    closed: AtomicBool,
}

struct ChannelIo {
    reader: FrameReader<DaemonStream>,
    writer: FrameWriter<DaemonStream>,
}

#[derive(Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// Held while a caller owns the connection; hands it to the next ticket on drop.
struct Turn<'a> {
    channel: &'a CommandChannel,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut tickets = lock(&self.channel.tickets);
        tickets.serving = tickets.serving.wrapping_add(1);
        drop(tickets);
        self.channel.turn.notify_all();
    }
}

impl CommandChannel {
    /// Open the control connection described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.addr();
        let stream = match config.connect_timeout {
            Some(timeout) => TcpTransport::connect_timeout(&addr, timeout)?,
            None => TcpTransport::connect(&addr)?,
        };
        debug!(%addr, "control connection established");
        Self::new(stream, config.frame.clone())
    }

    /// Wrap an already connected stream.
    pub fn new(stream: DaemonStream, config: FrameConfig) -> Result<Self> {
        let control = stream.try_clone()?;
        let write_half = stream.try_clone()?;
        let reader = FrameReader::with_config_daemon(stream, config.clone())?;
        let writer = FrameWriter::with_config_daemon(write_half, config)?;

        Ok(Self {
            io: Mutex::new(ChannelIo { reader, writer }),
            tickets: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            control,
            closed: AtomicBool::new(false),
        })
    }

    /// Send `cmd` and wait for its 16-byte response.
    ///
    /// A negative result is returned as-is; use [`check`] to turn it into an
    /// error.
    pub fn execute(&self, cmd: &Command) -> Result<Response> {
        self.exchange(cmd, false)
    }

    /// Like [`execute`](Self::execute), but a positive result announces a
    /// payload of that many bytes, which is read before the next caller is
    /// served and returned in [`Response::payload`].
    pub fn execute_with_payload(&self, cmd: &Command) -> Result<Response> {
        self.exchange(cmd, true)
    }

    /// Like [`execute`](Self::execute), but only if no other caller holds or
    /// waits for the connection. Returns `None` without sending otherwise.
    pub fn try_execute(&self, cmd: &Command) -> Option<Result<Response>> {
        let turn = self.try_acquire_turn()?;
        Some(self.exchange_in_turn(turn, cmd, false))
    }

    /// Close the control connection.
    ///
    /// A caller blocked waiting for a response fails with
    /// [`ClientError::Closed`], as does every later call. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("closing control connection");
        self.control
            .shutdown()
            .map_err(|err| ClientError::ShutdownFailed(err.to_string()))
    }

    /// Whether the channel has been closed or failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn exchange(&self, cmd: &Command, with_payload: bool) -> Result<Response> {
        let turn = self.acquire_turn();
        self.exchange_in_turn(turn, cmd, with_payload)
    }

    fn exchange_in_turn(
        &self,
        _turn: Turn<'_>,
        cmd: &Command,
        with_payload: bool,
    ) -> Result<Response> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let outcome = lock(&self.io).round_trip(cmd, with_payload);
        outcome.map_err(|err| {
            if self.is_closed() {
                return ClientError::Closed;
            }
            // A fixed-size stream cannot resynchronize after a failed exchange.
            warn!(
                opcode = opcode_name(cmd.opcode),
                error = %err,
                "control connection failed"
            );
            self.closed.store(true, Ordering::Release);
            let _ = self.control.shutdown();
            err
        })
    }

    fn acquire_turn(&self) -> Turn<'_> {
        let mut tickets = lock(&self.tickets);
        let ticket = tickets.next;
        tickets.next = tickets.next.wrapping_add(1);
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { channel: self }
    }

    fn try_acquire_turn(&self) -> Option<Turn<'_>> {
        let mut tickets = lock(&self.tickets);
        if tickets.serving != tickets.next {
            return None;
        }
        tickets.next = tickets.next.wrapping_add(1);
        Some(Turn { channel: self })
    }
}

impl ChannelIo {
    fn round_trip(&mut self, cmd: &Command, with_payload: bool) -> Result<Response> {
        self.writer.send(cmd)?;
        let mut response = self.reader.read_response()?;
        if with_payload && response.result > 0 {
            response.payload = self.reader.read_payload(response.result as usize)?;
        }
        debug!(
            opcode = opcode_name(cmd.opcode),
            p1 = cmd.p1,
            p2 = cmd.p2,
            result = response.result,
            "command complete"
        );
        Ok(response)
    }
}

/// Apply `mode` to a raw daemon result.
///
/// With [`ErrorMode::Raise`] a negative result becomes
/// [`ClientError::Daemon`]; with [`ErrorMode::ReturnCode`] it is passed
/// through unchanged.
pub fn check(result: i32, mode: ErrorMode) -> Result<i32> {
    match mode {
        ErrorMode::Raise if result < 0 => Err(DaemonError::new(result).into()),
        _ => Ok(result),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
