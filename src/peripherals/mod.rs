//! Peripheral aggregate.
//!
//! `PeripheralSet` is the single struct every I/O handler and scheduler
//! callback receives: the signal pool, the interrupt controller, and every
//! concrete peripheral instance for the device being simulated. Keeping
//! them together (rather than threading five separate mutable references
//! through every handler call) is what lets handler functions stay plain
//! `fn` pointers instead of closures.

pub mod adc;
pub mod extint;
pub mod flash;
pub mod ioport;
pub mod timer;
pub mod uart;
pub mod usi;
pub mod watchdog;

pub use adc::Adc;
pub use extint::ExtInt;
pub use flash::FlashCtrl;
pub use ioport::IoPort;
pub use timer::Timer;
pub use uart::Uart;
pub use usi::Usi;
pub use watchdog::Watchdog;

use crate::interrupt::InterruptController;
use crate::peripheral::Peripheral;
use crate::signal::SignalPool;

/// Every peripheral instance wired up for one simulated chip, plus the
/// signal pool and interrupt controller all of them share.
#[derive(Debug)]
pub struct PeripheralSet {
    pub pool: SignalPool,
    pub interrupts: InterruptController,
    pub ports: Vec<IoPort>,
    pub timers: Vec<Timer>,
    pub extints: Vec<ExtInt>,
    pub flash_ctrl: FlashCtrl,
    pub usi: Option<Usi>,
    pub watchdog: Watchdog,
    pub adc: Option<Adc>,
    pub uarts: Vec<Uart>,
}

impl PeripheralSet {
    /// An instance with no peripheral instances wired - used by core-loop
    /// plumbing tests (`bus.rs`, `scheduler.rs`) that don't need a whole
    /// device table.
    pub fn empty() -> Self {
        let mut pool = SignalPool::new();
        let interrupts = InterruptController::new(&mut pool);
        Self {
            pool,
            interrupts,
            ports: Vec::new(),
            timers: Vec::new(),
            extints: Vec::new(),
            flash_ctrl: FlashCtrl::new(0),
            usi: None,
            watchdog: Watchdog::new(),
            adc: None,
            uarts: Vec::new(),
        }
    }

    /// Resets every registered peripheral, in registration order, the way
    /// core reset invokes each peripheral's `reset()`.
    pub fn reset_all(&mut self) {
        self.interrupts.reset();
        for p in &mut self.ports {
            p.reset();
        }
        for t in &mut self.timers {
            t.reset();
        }
        for e in &mut self.extints {
            e.reset();
        }
        self.flash_ctrl.reset();
        if let Some(u) = &mut self.usi {
            u.reset();
        }
        self.watchdog.reset();
        if let Some(a) = &mut self.adc {
            a.reset();
        }
        for u in &mut self.uarts {
            u.reset();
        }
    }

    /// Walks every peripheral's `ioctl` until one claims `code`.
    pub fn ioctl(&mut self, code: u32, arg: u32) -> Option<u32> {
        for p in &mut self.ports {
            if let Some(v) = p.ioctl(code, arg) {
                return Some(v);
            }
        }
        for t in &mut self.timers {
            if let Some(v) = t.ioctl(code, arg) {
                return Some(v);
            }
        }
        for e in &mut self.extints {
            if let Some(v) = e.ioctl(code, arg) {
                return Some(v);
            }
        }
        if let Some(v) = self.flash_ctrl.ioctl(code, arg) {
            return Some(v);
        }
        if let Some(u) = &mut self.usi {
            if let Some(v) = u.ioctl(code, arg) {
                return Some(v);
            }
        }
        if let Some(v) = self.watchdog.ioctl(code, arg) {
            return Some(v);
        }
        if let Some(a) = &mut self.adc {
            if let Some(v) = a.ioctl(code, arg) {
                return Some(v);
            }
        }
        for u in &mut self.uarts {
            if let Some(v) = u.ioctl(code, arg) {
                return Some(v);
            }
        }
        None
    }

    /// Ticks every free-running timer by `cycles`, called once per retired
    /// instruction from the core loop.
    pub fn tick_timers(&mut self, cycles: u64) {
        let Self { pool, interrupts, timers, .. } = self;
        for t in timers {
            t.tick(cycles, pool, interrupts);
        }
    }

    /// Raises an interrupt vector by index, routed through the shared
    /// controller and signal pool. `mark_raised` lets the caller set the
    /// peripheral-owned "raised" status bit before the controller decides
    /// whether the vector is enabled.
    pub fn raise_interrupt(&mut self, idx: usize, enabled: bool, mark_raised: impl FnOnce(), sreg_i: bool, sleeping: bool) -> bool {
        self.interrupts.raise_interrupt(&mut self.pool, idx, enabled, mark_raised, sreg_i, sleeping)
    }
}
