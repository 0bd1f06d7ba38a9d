use std::time::Duration;

use crate::registry::{HandlerResult, LineEvent, LineHandler};

/// Default debounce window: 100 ms in daemon ticks (microseconds).
pub const DEFAULT_THRESHOLD_TICKS: u32 = 100_000;

/// Ticks from `earlier` to `later` on the 32-bit daemon clock.
///
/// The clock wraps roughly every 71.6 minutes; a `later` that is numerically
/// smaller than `earlier` is a short interval across the wrap.
pub fn elapsed_ticks(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Drops events that arrive within a threshold of the last forwarded one.
///
/// Wraps any [`LineHandler`] and is itself one, so it can be registered
/// anywhere a handler can.
pub struct Debounce<H> {
    inner: H,
    threshold: u32,
    last_tick: u32,
}

impl<H: LineHandler> Debounce<H> {
    /// Debounce with the default 100 ms window.
    pub fn new(inner: H) -> Self {
        Self::with_threshold_ticks(inner, DEFAULT_THRESHOLD_TICKS)
    }

    /// Debounce with a window given as a duration.
    ///
    /// Windows longer than the tick range saturate at `u32::MAX` ticks.
    pub fn with_threshold(inner: H, threshold: Duration) -> Self {
        let ticks = u32::try_from(threshold.as_micros()).unwrap_or(u32::MAX);
        Self::with_threshold_ticks(inner, ticks)
    }

    /// Debounce with a window in daemon ticks.
    pub fn with_threshold_ticks(inner: H, threshold: u32) -> Self {
        Self {
            inner,
            threshold,
            last_tick: 0,
        }
    }

    pub fn threshold_ticks(&self) -> u32 {
        self.threshold
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: LineHandler> LineHandler for Debounce<H> {
    fn on_event(&mut self, event: LineEvent) -> HandlerResult {
        if elapsed_ticks(self.last_tick, event.tick) <= self.threshold {
            return Ok(());
        }
        self.last_tick = event.tick;
        self.inner.on_event(event)
    }
}
