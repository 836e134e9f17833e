//! Button edge debouncing
//!
//! The button line is biased low and raises an interrupt on its falling
//! edge. Contact bounce produces bursts of edges; only the first edge of a
//! burst is accepted and turned into a sleep request.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_time::{Duration, Instant};
use embedded_hal_async::digital::Wait;
use log::{debug, info, warn};

use crate::power::SleepSignal;

/// Last-accepted-edge bookkeeping with a fixed minimum spacing.
///
/// The check and the update happen inside one critical section, so two
/// overlapping edges can never both pass.
pub struct DebounceGate {
    window: Duration,
    /// Earliest instant after which the next edge may be accepted
    next_allowed: Mutex<Cell<Option<Instant>>>,
}

impl DebounceGate {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            next_allowed: Mutex::new(Cell::new(None)),
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Accept the edge seen at `now` unless it falls within the window of
    /// the previously accepted one.
    pub fn try_accept(&self, now: Instant) -> bool {
        critical_section::with(|cs| {
            let next_allowed = self.next_allowed.borrow(cs);
            match next_allowed.get() {
                Some(deadline) if now <= deadline => false,
                _ => {
                    next_allowed.set(Some(now.checked_add(self.window).unwrap_or(Instant::MAX)));
                    true
                }
            }
        })
    }
}

/// Filters raw button edges and raises the sleep request on accepted ones.
///
/// The edge path only records and signals; the control loop performs the
/// actual teardown.
pub struct ButtonDebouncer<'a> {
    gate: DebounceGate,
    requests: &'a SleepSignal,
}

impl<'a> ButtonDebouncer<'a> {
    pub const fn new(window: Duration, requests: &'a SleepSignal) -> Self {
        Self {
            gate: DebounceGate::new(window),
            requests,
        }
    }

    /// Handle one edge observed at `now`. Returns whether it was accepted.
    pub fn on_edge(&self, now: Instant) -> bool {
        if self.gate.try_accept(now) {
            info!("Button edge accepted at {} ms", now.as_millis());
            self.requests.signal(now);
            true
        } else {
            debug!("Button edge within debounce window, ignored");
            false
        }
    }

    /// Wait for falling edges forever, feeding each into [`Self::on_edge`].
    pub async fn watch<B: Wait>(&self, button: &mut B) -> ! {
        loop {
            if let Err(e) = button.wait_for_falling_edge().await {
                warn!("Button edge wait failed: {:?}", e);
                continue;
            }
            self.on_edge(Instant::now());
        }
    }
}
