//! Line callbacks and the monitor mask derived from them.
//!
//! The registry owns the set of active callbacks. Every `add` (and, with
//! [`MaskPolicy::Exact`], every `cancel`) recomputes the aggregate mask and
//! pushes it through a [`MaskSink`]. The notification loop dispatches into
//! the registry from a snapshot, so handlers run without any registry lock
//! held and may add or cancel callbacks themselves.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error};

use crate::config::MaskPolicy;
use crate::error::{ClientError, Result};

/// Highest line number the notification mask can carry.
pub const MAX_LINE: u8 = 31;

/// Which transitions a callback fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Low to high.
    Rising = 0,
    /// High to low.
    Falling = 1,
    /// Both directions.
    Either = 2,
}

impl Edge {
    /// Numeric value used by the daemon.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether a transition that ends at `new_level` (0 or 1) fires this edge.
    ///
    /// The edge code XOR the new level is non-zero exactly for rising edges
    /// ending high, falling edges ending low, and every `Either` transition.
    pub fn fires_on(self, new_level: u32) -> bool {
        self.code() ^ new_level != 0
    }
}

/// Level reported to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low = 0,
    High = 1,
    /// Synthetic level reported when the line's watchdog expires.
    Timeout = 2,
}

impl Level {
    /// Numeric value used by the daemon.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// One dispatched line event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub line: u8,
    pub level: Level,
    /// Daemon microsecond tick of the change, wraps at 2^32.
    pub tick: u32,
}

/// Outcome of a handler call. Errors are logged, never propagated.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receiver of line events.
pub trait LineHandler: Send {
    fn on_event(&mut self, event: LineEvent) -> HandlerResult;
}

impl<F> LineHandler for F
where
    F: FnMut(LineEvent) -> HandlerResult + Send,
{
    fn on_event(&mut self, event: LineEvent) -> HandlerResult {
        self(event)
    }
}

/// Destination for the aggregate monitor mask.
pub trait MaskSink: Send + Sync {
    fn push_mask(&self, mask: u32) -> Result<()>;
}

/// Shared, cloneable set of line callbacks.
#[derive(Clone)]
pub struct CallbackRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    entries: Mutex<Vec<Arc<Entry>>>,
    // Last mask the daemon accepted. Held across recompute-and-push so masks
    // reach the daemon in order.
    pushed: Mutex<u32>,
    sink: Mutex<Option<Arc<dyn MaskSink>>>,
    policy: MaskPolicy,
    next_id: AtomicU64,
}

struct Entry {
    id: u64,
    line: u8,
    edge: Edge,
    active: AtomicBool,
    handler: Mutex<Box<dyn LineHandler>>,
}

impl Entry {
    fn bit(&self) -> u32 {
        1 << self.line
    }

    fn invoke(&self, event: LineEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut handler = lock(&self.handler);
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_event(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(
                id = self.id,
                line = event.line,
                error = %err,
                "line callback failed"
            ),
            Err(payload) => error!(
                id = self.id,
                line = event.line,
                panic = panic_message(payload.as_ref()),
                "line callback panicked"
            ),
        }
    }
}

impl CallbackRegistry {
    /// An empty registry with no mask destination yet.
    pub fn new(policy: MaskPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                pushed: Mutex::new(0),
                sink: Mutex::new(None),
                policy,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// An empty registry pushing masks to `sink`.
    pub fn with_sink(sink: Arc<dyn MaskSink>, policy: MaskPolicy) -> Self {
        let registry = Self::new(policy);
        registry.attach_sink(sink);
        registry
    }

    /// Set the mask destination. Later adds and cancels push through it.
    pub fn attach_sink(&self, sink: Arc<dyn MaskSink>) {
        *lock(&self.inner.sink) = Some(sink);
    }

    /// Register `handler` for `edge` transitions on `line`.
    ///
    /// Fails with [`ClientError::InvalidArgument`] for lines above
    /// [`MAX_LINE`]. If the new mask cannot be pushed, the callback is
    /// removed again and the push error is returned.
    pub fn add<H>(&self, line: u8, edge: Edge, handler: H) -> Result<CallbackHandle>
    where
        H: LineHandler + 'static,
    {
        self.insert(line, edge, Box::new(handler), None)
    }

    /// Register a callback that only counts matching events.
    ///
    /// Read the count with [`CallbackHandle::tally`].
    pub fn add_tally(&self, line: u8, edge: Edge) -> Result<CallbackHandle> {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let handler = move |_: LineEvent| -> HandlerResult {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        };
        self.insert(line, edge, Box::new(handler), Some(count))
    }

    /// Remove callback `id`.
    ///
    /// Returns `Ok(false)` if no such callback is active. Dispatch stops for
    /// the callback even when the following mask push fails.
    pub fn cancel(&self, id: u64) -> Result<bool> {
        let mut pushed = lock(&self.inner.pushed);
        let mask = {
            let mut entries = lock(&self.inner.entries);
            let Some(pos) = entries.iter().position(|entry| entry.id == id) else {
                return Ok(false);
            };
            let entry = entries.remove(pos);
            entry.active.store(false, Ordering::Release);
            mask_of(&entries)
        };
        debug!(id, mask = format_args!("{mask:#010x}"), "callback cancelled");

        if self.inner.policy == MaskPolicy::Exact {
            self.inner.push_mask(mask)?;
            *pushed = mask;
        }
        Ok(true)
    }

    /// Bitwise OR of the lines of all active callbacks.
    pub fn mask(&self) -> u32 {
        mask_of(&lock(&self.inner.entries))
    }

    /// Number of active callbacks.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// Whether no callback is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch a level change. `changed` holds the bits that differ from the
    /// previous levels.
    pub(crate) fn dispatch_levels(&self, changed: u32, level: u32, tick: u32) {
        if changed == 0 {
            return;
        }
        for entry in self.snapshot() {
            let bit = entry.bit();
            if changed & bit == 0 {
                continue;
            }
            let new_level = u32::from(level & bit != 0);
            if entry.edge.fires_on(new_level) {
                entry.invoke(LineEvent {
                    line: entry.line,
                    level: Level::from(new_level == 1),
                    tick,
                });
            }
        }
    }

    /// Dispatch a watchdog timeout to every callback on `line`.
    pub(crate) fn dispatch_timeout(&self, line: u8, tick: u32) {
        for entry in self.snapshot() {
            if entry.line == line {
                entry.invoke(LineEvent {
                    line,
                    level: Level::Timeout,
                    tick,
                });
            }
        }
    }

    fn insert(
        &self,
        line: u8,
        edge: Edge,
        handler: Box<dyn LineHandler>,
        tally: Option<Arc<AtomicU64>>,
    ) -> Result<CallbackHandle> {
        if line > MAX_LINE {
            return Err(ClientError::InvalidArgument(format!(
                "line {line} is not 0-{MAX_LINE}"
            )));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            id,
            line,
            edge,
            active: AtomicBool::new(true),
            handler: Mutex::new(handler),
        });

        let mut pushed = lock(&self.inner.pushed);
        let mask = {
            let mut entries = lock(&self.inner.entries);
            entries.push(entry);
            match self.inner.policy {
                MaskPolicy::Exact => mask_of(&entries),
                MaskPolicy::GrowOnly => *pushed | mask_of(&entries),
            }
        };

        if let Err(err) = self.inner.push_mask(mask) {
            let mut entries = lock(&self.inner.entries);
            if let Some(pos) = entries.iter().position(|entry| entry.id == id) {
                entries.remove(pos).active.store(false, Ordering::Release);
            }
            return Err(err);
        }
        *pushed = mask;

        debug!(
            id,
            line,
            ?edge,
            mask = format_args!("{mask:#010x}"),
            "callback added"
        );
        Ok(CallbackHandle {
            id,
            line,
            edge,
            tally,
            registry: Arc::downgrade(&self.inner),
        })
    }

    fn snapshot(&self) -> Vec<Arc<Entry>> {
        lock(&self.inner.entries).clone()
    }
}

impl Inner {
    fn push_mask(&self, mask: u32) -> Result<()> {
        let sink = lock(&self.sink).clone();
        match sink {
            Some(sink) => sink.push_mask(mask),
            None => Ok(()),
        }
    }
}

/// Handle to a registered callback.
///
/// Dropping the handle does not cancel the callback.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    id: u64,
    line: u8,
    edge: Edge,
    tally: Option<Arc<AtomicU64>>,
    registry: Weak<Inner>,
}

impl CallbackHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Events counted by a tally callback; always 0 for other callbacks.
    pub fn tally(&self) -> u64 {
        self.tally
            .as_ref()
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Reset a tally callback's count to 0.
    pub fn reset_tally(&self) {
        if let Some(count) = &self.tally {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// Cancel this callback. Returns `Ok(false)` if it was already cancelled
    /// or the registry is gone.
    pub fn cancel(&self) -> Result<bool> {
        match self.registry.upgrade() {
            Some(inner) => CallbackRegistry { inner }.cancel(self.id),
            None => Ok(false),
        }
    }
}

fn mask_of(entries: &[Arc<Entry>]) -> u32 {
    entries.iter().fold(0, |mask, entry| mask | entry.bit())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
