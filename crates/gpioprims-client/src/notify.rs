//! The notification connection and its background read loop.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use gpioprims_transport::{DaemonStream, TcpTransport};
use gpioprims_wire::{
    opcode, Command, FrameConfig, FrameReader, FrameWriter, NotificationKind,
};
use tracing::{debug, error, trace};

use crate::config::ClientConfig;
use crate::daemon_error::DaemonError;
use crate::error::{ClientError, Result};
use crate::registry::CallbackRegistry;

const THREAD_NAME: &str = "gpioprims-notify";

/// Lifecycle of a [`NotificationLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Opening the connection and the notification pipe.
    Connecting,
    /// Reading and dispatching records.
    Active,
    /// Stop requested, waiting for the read loop to exit.
    Stopping,
    /// Terminal. The completion signal has fired.
    Closed,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Connecting,
            1 => LoopState::Active,
            2 => LoopState::Stopping,
            _ => LoopState::Closed,
        }
    }
}

/// One-shot signal fired when the read loop has exited.
#[derive(Debug, Default)]
pub struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    fn set(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        if !*done {
            *done = true;
            self.signal.notify_all();
        }
    }

    /// Whether the loop has exited.
    pub fn is_set(&self) -> bool {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the loop has exited.
    pub fn wait(&self) {
        let done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let _done = self
            .signal
            .wait_while(done, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Block until the loop has exited or `timeout` passes. Returns whether
    /// it exited.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        let (done, _) = self
            .signal
            .wait_timeout_while(done, timeout, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *done
    }
}

struct Shared {
    state: AtomicU8,
    stop: AtomicBool,
    completion: Arc<Completion>,
}

impl Shared {
    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Marks the loop closed when the read thread ends, however it ends.
struct ClosedGuard(Arc<Shared>);

impl Drop for ClosedGuard {
    fn drop(&mut self) {
        self.0.set_state(LoopState::Closed);
        self.0.completion.set();
    }
}

/// Owned handle to the background notification reader.
///
/// The loop holds its own connection to the daemon, separate from the control
/// connection. It reads 12-byte records and dispatches level changes and
/// watchdog timeouts into a [`CallbackRegistry`] until [`stop`](Self::stop)
/// is called or the connection fails.
pub struct NotificationLoop {
    handle: u32,
    shared: Arc<Shared>,
    stream: DaemonStream,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl NotificationLoop {
    /// Connect to the daemon in `config`, open a notification pipe on that
    /// connection and start dispatching into `registry`.
    pub fn start(config: &ClientConfig, registry: CallbackRegistry) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(LoopState::Connecting as u8),
            stop: AtomicBool::new(false),
            completion: Arc::new(Completion::default()),
        });

        let addr = config.addr();
        let stream = match config.connect_timeout {
            Some(timeout) => TcpTransport::connect_timeout(&addr, timeout)?,
            None => TcpTransport::connect(&addr)?,
        };
        let control = stream.try_clone()?;
        let (handle, reader) = open_pipe(stream)?;
        debug!(%addr, handle, "notification pipe opened");

        shared.set_state(LoopState::Active);
        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(reader, &registry, thread_shared))
            .map_err(ClientError::Io)?;

        Ok(Self {
            handle,
            shared,
            stream: control,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Notification handle the daemon assigned to this pipe.
    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    /// The signal fired when the read loop exits.
    pub fn completion(&self) -> Arc<Completion> {
        Arc::clone(&self.shared.completion)
    }

    /// Stop the loop and wait until it has exited.
    ///
    /// Safe to call more than once and from any thread. Called from a handler
    /// running on the loop thread, it only requests the stop; the loop exits
    /// once the handler returns.
    pub fn stop(&self) -> Result<()> {
        let shutdown = self.request_stop();
        if thread::current().id() == self.thread_id {
            return shutdown;
        }

        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            thread.join().map_err(|_| {
                ClientError::ShutdownFailed("notification thread panicked".to_string())
            })?;
        }
        self.shared.completion.wait();
        shutdown
    }

    /// Ask the loop to exit without waiting for it.
    ///
    /// Shuts the notification socket down so a blocked read returns at once.
    /// A handler that is still running finishes first. Repeated calls are
    /// no-ops.
    pub fn request_stop(&self) -> Result<()> {
        if self.shared.stop.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = self.shared.state.compare_exchange(
            LoopState::Active as u8,
            LoopState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!(handle = self.handle, "stopping notification loop");
        self.stream
            .shutdown()
            .map_err(|err| ClientError::ShutdownFailed(err.to_string()))
    }

    /// Block until the loop has exited.
    pub fn wait_closed(&self) {
        self.shared.completion.wait();
    }

    /// Block until the loop has exited or `timeout` passes.
    pub fn wait_closed_timeout(&self, timeout: Duration) -> bool {
        self.shared.completion.wait_timeout(timeout)
    }
}

impl Drop for NotificationLoop {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Turn `stream` into a notification pipe and return the daemon's handle.
fn open_pipe(stream: DaemonStream) -> Result<(u32, FrameReader<DaemonStream>)> {
    let write_half = stream.try_clone()?;
    let mut writer = FrameWriter::new(write_half);
    // The pipe read blocks until the next record, however long that takes.
    let mut reader = FrameReader::with_config_daemon(stream, FrameConfig::default())?;

    writer.send(&Command::new(opcode::NOIB, 0, 0))?;
    let response = reader.read_response()?;
    if response.is_error() {
        return Err(DaemonError::new(response.result).into());
    }
    Ok((response.result_bits(), reader))
}

fn run(mut reader: FrameReader<DaemonStream>, registry: &CallbackRegistry, shared: Arc<Shared>) {
    let _closed = ClosedGuard(Arc::clone(&shared));
    let mut last_level: u32 = 0;

    loop {
        let record = match reader.read_notification() {
            Ok(record) => record,
            Err(err) => {
                if shared.stop.load(Ordering::Acquire) {
                    debug!("notification loop stopped");
                } else {
                    error!(error = %err, "notification connection lost");
                }
                break;
            }
        };
        if shared.stop.load(Ordering::Acquire) {
            debug!("notification loop stopped");
            break;
        }

        match record.kind() {
            NotificationKind::LevelChange => {
                let changed = record.level ^ last_level;
                last_level = record.level;
                registry.dispatch_levels(changed, record.level, record.tick);
            }
            NotificationKind::Watchdog { line } => {
                registry.dispatch_timeout(line, record.tick);
            }
            NotificationKind::Keepalive => {
                trace!(sequence = record.sequence, "keepalive");
            }
            NotificationKind::Unknown => {
                debug!(flags = record.flags, "ignoring notification");
            }
        }
    }

    let _ = reader.get_ref().shutdown();
}
