use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gpioprims_wire::{opcode, Command, Response};
use tracing::{debug, info, warn};

use crate::channel::{check, CommandChannel};
use crate::config::{ClientConfig, ErrorMode};
use crate::error::Result;
use crate::notify::{LoopState, NotificationLoop};
use crate::registry::{CallbackHandle, CallbackRegistry, Edge, LineHandler, MaskSink};

/// How long `close` lets a running handler finish before failing its
/// control commands.
const HANDLER_GRACE: Duration = Duration::from_millis(250);

/// A connection to a GPIO daemon.
///
/// Owns the control connection, the notification loop and the callback
/// registry. Commands may be issued from any number of threads; handlers run
/// on the notification thread.
///
/// # Example
///
/// ```no_run
/// use gpioprims_client::{Client, ClientConfig, Edge, HandlerResult, LineEvent};
///
/// let client = Client::connect(ClientConfig::default())?;
/// client.add_callback(17, Edge::Rising, |event: LineEvent| -> HandlerResult {
///     println!("line {} rose at {}", event.line, event.tick);
///     Ok(())
/// })?;
/// # Ok::<(), gpioprims_client::ClientError>(())
/// ```
pub struct Client {
    config: ClientConfig,
    channel: Arc<CommandChannel>,
    registry: CallbackRegistry,
    notify: NotificationLoop,
    closed: AtomicBool,
}

/// Pushes monitor masks with NOTIFY-BEGIN on the control connection.
struct PipeMaskSink {
    channel: Arc<CommandChannel>,
    handle: u32,
}

impl MaskSink for PipeMaskSink {
    fn push_mask(&self, mask: u32) -> Result<()> {
        let response = self
            .channel
            .execute(&Command::new(opcode::NB, self.handle, mask))?;
        check(response.result, ErrorMode::Raise).map(|_| ())
    }
}

impl Client {
    /// Connect the control connection, then the notification connection.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let channel = Arc::new(CommandChannel::connect(&config)?);
        let registry = CallbackRegistry::new(config.mask_policy);

        let notify = match NotificationLoop::start(&config, registry.clone()) {
            Ok(notify) => notify,
            Err(err) => {
                let _ = channel.close();
                return Err(err);
            }
        };
        registry.attach_sink(Arc::new(PipeMaskSink {
            channel: Arc::clone(&channel),
            handle: notify.handle(),
        }));

        info!(
            addr = %config.addr(),
            handle = notify.handle(),
            "connected to gpio daemon"
        );
        Ok(Self {
            config,
            channel,
            registry,
            notify,
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a raw command; see [`CommandChannel::execute`].
    pub fn execute(&self, cmd: &Command) -> Result<Response> {
        self.channel.execute(cmd)
    }

    /// Send a raw command that may announce a payload; see
    /// [`CommandChannel::execute_with_payload`].
    pub fn execute_with_payload(&self, cmd: &Command) -> Result<Response> {
        self.channel.execute_with_payload(cmd)
    }

    /// Apply the configured [`ErrorMode`] to a raw result.
    pub fn check(&self, result: i32) -> Result<i32> {
        check(result, self.config.error_mode)
    }

    /// Apply `mode` to a raw result, overriding the configured one.
    pub fn check_with(&self, result: i32, mode: ErrorMode) -> Result<i32> {
        check(result, mode)
    }

    /// Call `handler` on `edge` transitions of `line`.
    pub fn add_callback<H>(&self, line: u8, edge: Edge, handler: H) -> Result<CallbackHandle>
    where
        H: LineHandler + 'static,
    {
        self.registry.add(line, edge, handler)
    }

    /// Count `edge` transitions of `line`.
    pub fn add_tally(&self, line: u8, edge: Edge) -> Result<CallbackHandle> {
        self.registry.add_tally(line, edge)
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn notification_state(&self) -> LoopState {
        self.notify.state()
    }

    /// Notification handle the daemon assigned to this client.
    pub fn notification_handle(&self) -> u32 {
        self.notify.handle()
    }

    /// Tear the connection down.
    ///
    /// Closes the notification pipe on the daemon, stops the notification
    /// loop and waits for it, then closes the control connection. If a
    /// handler is still running after a short grace period, the control
    /// connection is closed first so a command issued from the handler
    /// cannot hold teardown up. A command still waiting for its response
    /// fails with
    /// [`ClientError::Closed`](crate::ClientError::Closed). Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // The daemon also releases the handle when the pipe socket closes, so
        // the explicit close is skipped while another command holds the channel.
        let handle = self.notify.handle();
        match self
            .channel
            .try_execute(&Command::new(opcode::NC, handle, 0))
        {
            Some(Ok(response)) if response.is_error() => warn!(
                handle,
                code = response.result,
                "daemon refused to close notification pipe"
            ),
            Some(Ok(_)) => {}
            Some(Err(err)) => warn!(handle, error = %err, "could not close notification pipe"),
            None => debug!(handle, "control channel busy, not closing notification pipe"),
        }

        let requested = self.notify.request_stop();
        // A handler may be blocked on this channel; it only returns once the
        // control connection is closed under it.
        let early_close = (!self.notify.wait_closed_timeout(HANDLER_GRACE)).then(|| {
            debug!(handle, "handler still running, closing control connection first");
            self.channel.close()
        });
        let stopped = requested.and(self.notify.stop());
        let closed = match early_close {
            Some(closed) => closed,
            None => self.channel.close(),
        };
        info!(addr = %self.config.addr(), "disconnected from gpio daemon");
        stopped.and(closed)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "client teardown failed");
        }
    }
}
