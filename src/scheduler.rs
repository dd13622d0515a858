//! Cycle-timer scheduler (C2).
//!
//! A bounded queue of (absolute_when, callback, param) entries, kept sorted
//! so the next-to-fire sits at the end of the backing vector for O(1) pop.
//! Registering an entry first cancels any existing entry with the same
//! (callback, param) key. This is the clock every time-domain peripheral
//! (timers, UART bit timing, watchdog, ADC conversion latency, SPM
//! auto-clear) rides on.

use crate::error::{Result, SimError};
use crate::peripherals::PeripheralSet;

/// Capacity is bounded; overflow is the caller's problem; see
/// `CycleScheduler::register`.
pub const MAX_CYCLE_TIMERS: usize = 64;

/// Default slack reported by `process()` when the queue is empty.
const DEFAULT_SLACK: u64 = 1000;

/// A scheduler callback. Returns `0` for one-shot, or a non-zero absolute
/// cycle (which must be `> cycle`) to reschedule itself. `ctx` is the
/// peripheral set, not the scheduler itself - a callback that wants to
/// reschedule *itself* does so via the return value; anything needing to
/// touch the scheduler for a different key does so from a write handler
/// instead, which is handed the scheduler directly (see `bus.rs`).
pub type TimerFn = fn(param: u32, when: u64, ctx: &mut PeripheralSet) -> u64;

#[derive(Clone, Copy)]
#[derive(Debug)]
struct Entry {
    when: u64,
    callback: TimerFn,
    param: u32,
    /// Monotonically increasing sequence number, used only to break ties at
    /// equal `when` in insertion order.
    seq: u64,
}

/// Bounded, ordered cycle-timer queue. Entries are stored sorted by `when`
/// descending, so the soonest entry is the last element.
#[derive(Debug)]
pub struct CycleScheduler {
    entries: Vec<Entry>,
    next_seq: u64,
    frequency_hz: u64,
}

impl CycleScheduler {
    pub fn new(frequency_hz: u64) -> Self {
        Self { entries: Vec::with_capacity(MAX_CYCLE_TIMERS), next_seq: 0, frequency_hz }
    }

    pub fn set_frequency(&mut self, frequency_hz: u64) {
        self.frequency_hz = frequency_hz;
    }

    fn find_index(&self, callback: TimerFn, param: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.callback == callback && e.param == param)
    }

    /// `cancel(cb, param)`: removes by key; idempotent.
    pub fn cancel(&mut self, callback: TimerFn, param: u32) {
        if let Some(idx) = self.find_index(callback, param) {
            self.entries.remove(idx);
        }
    }

    /// `status(cb, param)`: returns `1 + cycles_until_fire` relative to
    /// `now`, or `0` if not scheduled.
    pub fn status(&self, callback: TimerFn, param: u32, now: u64) -> u64 {
        match self.find_index(callback, param) {
            Some(idx) => 1 + self.entries[idx].when.saturating_sub(now),
            None => 0,
        }
    }

    /// `register(delay_cycles, cb, param)`, relative to `now`.
    pub fn register(&mut self, now: u64, delay_cycles: u64, callback: TimerFn, param: u32) -> Result<()> {
        self.register_absolute(now.saturating_add(delay_cycles), callback, param)
    }

    /// `register_usec(delay_us, cb, param)`, converting via `frequency_hz`.
    pub fn register_usec(&mut self, now: u64, delay_us: u64, callback: TimerFn, param: u32) -> Result<()> {
        let cycles = delay_us.saturating_mul(self.frequency_hz) / 1_000_000;
        self.register(now, cycles, callback, param)
    }

    fn register_absolute(&mut self, when: u64, callback: TimerFn, param: u32) -> Result<()> {
        self.cancel(callback, param);
        if self.entries.len() >= MAX_CYCLE_TIMERS {
            log::error!("cycle-timer pool exhausted registering param={param} at cycle {when}");
            return Err(SimError::SchedulerFull);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        // Keep entries sorted descending by `when`; ties keep their
        // relative insertion order by placing new ties before existing
        // ones at the same `when` (since we pop from the end, earlier
        // insertions at an equal `when` must sit closer to the end).
        let pos = self
            .entries
            .iter()
            .position(|e| e.when < when || (e.when == when && e.seq < seq))
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, Entry { when, callback, param, seq });
        Ok(())
    }

    /// `process()`: fires every due entry (`when <= cycle`), in `when`
    /// order with same-cycle ties in insertion order. Returns cycles until
    /// the next pending entry, or `DEFAULT_SLACK` if the queue is empty.
    pub fn process(&mut self, cycle: u64, ctx: &mut PeripheralSet) -> u64 {
        loop {
            let due = match self.entries.last() {
                Some(e) if e.when <= cycle => *e,
                _ => break,
            };
            self.entries.pop();

            let reschedule = (due.callback)(due.param, due.when, ctx);
            if reschedule != 0 {
                let when = if reschedule > cycle { reschedule } else { cycle + 1 };
                let _ = self.register_absolute(when, due.callback, due.param);
            }
        }

        match self.entries.last() {
            Some(e) => e.when.saturating_sub(cycle),
            None => DEFAULT_SLACK,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
