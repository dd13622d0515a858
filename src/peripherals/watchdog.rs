//! Watchdog timer (C13): WDTCSR prescaler, timed-sequence write
//! protection, interrupt-then-reset mode, reset-cause latch.
//!
//! A write that sets WDCE must also set WDE in the same write (the
//! "timed sequence"); that grants a four-cycle window in which a
//! following write may change WDE/WDP, after which WDCE clears itself
//! and further changes are ignored until the sequence is repeated. This
//! mirrors the datasheet's anti-runaway-firmware protection (§4.13).

use crate::bus::{ReadFn, WriteFn};
use crate::peripheral::Peripheral;
use crate::peripherals::PeripheralSet;
use crate::scheduler::CycleScheduler;

mod bits {
    pub const WDP0: u8 = 1 << 0;
    pub const WDP1: u8 = 1 << 1;
    pub const WDP2: u8 = 1 << 2;
    pub const WDE: u8 = 1 << 3;
    pub const WDCE: u8 = 1 << 4;
    pub const WDP3: u8 = 1 << 5;
    pub const WDIE: u8 = 1 << 6;
    pub const WDIF: u8 = 1 << 7;
    pub const WDP_LOW: u8 = WDP0 | WDP1 | WDP2;
}

const WDCE_WINDOW_CYCLES: u64 = 4;

#[derive(Debug)]
pub struct Watchdog {
    wdtcsr: u8,
    ce_window_open: bool,
    pub vector: Option<usize>,
    pub wdrf: bool,
    pub reset_pending: bool,
}

impl Watchdog {
    pub fn new() -> Self {
        Self { wdtcsr: 0, ce_window_open: false, vector: None, wdrf: false, reset_pending: false }
    }

    pub fn read_wdtcsr(&self) -> u8 {
        self.wdtcsr
    }

    fn prescale_index(&self) -> u8 {
        let low = self.wdtcsr & bits::WDP_LOW;
        let high = (self.wdtcsr & bits::WDP3 != 0) as u8;
        low | (high << 3)
    }

    /// Timeout period in approximate cycles at a nominal 128kHz watchdog
    /// oscillator, doubling from 16ms (index 0) to 8s (index 9).
    fn timeout_cycles(&self, core_hz: u64) -> u64 {
        let ms = 16u64 << self.prescale_index().min(9);
        ms.saturating_mul(core_hz) / 1000
    }

    /// Handles a write to WDTCSR, gated by the timed-sequence rule.
    pub fn write_wdtcsr(&mut self, scheduler: &mut CycleScheduler, cycle: u64, value: u8, param: u32, core_hz: u64) {
        let setting_ce_and_de = value & (bits::WDCE | bits::WDE) == (bits::WDCE | bits::WDE);
        let unlocked = self.ce_window_open;

        if setting_ce_and_de {
            self.wdtcsr = (self.wdtcsr & !bits::WDE) | value;
            self.ce_window_open = true;
            let _ = scheduler.register(cycle, WDCE_WINDOW_CYCLES, ce_window_expire, param);
        } else if unlocked {
            self.wdtcsr = value & !bits::WDCE;
            self.ce_window_open = false;
            scheduler.cancel(ce_window_expire, param);
        } else {
            // Outside the unlock window, only WDIE/WDIF are freely
            // writable (WDIF write-1-to-clear); WDE/WDP are latched.
            self.wdtcsr = (self.wdtcsr & (bits::WDE | bits::WDP_LOW | bits::WDP3)) | (value & (bits::WDIE | bits::WDIF));
            if value & bits::WDIF != 0 {
                self.wdtcsr &= !bits::WDIF;
            }
        }

        if self.wdtcsr & (bits::WDE | bits::WDIE) != 0 {
            let timeout = self.timeout_cycles(core_hz);
            let _ = scheduler.register(cycle, timeout, watchdog_timeout, param);
        } else {
            scheduler.cancel(watchdog_timeout, param);
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for Watchdog {
    fn reset(&mut self) {
        self.wdtcsr = 0;
        self.ce_window_open = false;
        self.reset_pending = false;
    }
}

fn ce_window_expire(param: u32, _when: u64, ctx: &mut PeripheralSet) -> u64 {
    let _ = param;
    ctx.watchdog.ce_window_open = false;
    0
}

fn watchdog_timeout(param: u32, _when: u64, ctx: &mut PeripheralSet) -> u64 {
    let wd = &mut ctx.watchdog;
    if wd.wdtcsr & bits::WDIE != 0 {
        wd.wdtcsr |= bits::WDIF;
        if wd.wdtcsr & bits::WDE == 0 {
            // Interrupt-only mode auto-disables WDIE after firing once.
            wd.wdtcsr &= !bits::WDIE;
        }
        if let Some(idx) = wd.vector {
            ctx.raise_interrupt(idx, true, || {}, true, false);
        }
        return 0;
    }
    if wd.wdtcsr & bits::WDE != 0 {
        wd.reset_pending = true;
        wd.wdrf = true;
    }
    let _ = param;
    0
}

pub const READ_WDTCSR: ReadFn = |p, _d, _s, _c, _a, _param| p.watchdog.read_wdtcsr();
pub const WRITE_WDTCSR: WriteFn = |p, _d, scheduler, cycle, _a, value, param| {
    p.watchdog.write_wdtcsr(scheduler, cycle, value, param, 1_000_000);
};
