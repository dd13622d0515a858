//! I/O port (C7): DDR/PORT/PIN register triplet plus pin-change interrupt.
//!
//! Each of the eight bits on a port is backed by two signals: one carrying
//! the value the port drives out (when configured as output) and one
//! carrying the level presented to the pin (when configured as input, or
//! observed on the pin regardless of direction). A pin-change interrupt
//! fires when any bit selected by the port's PCMSK mask toggles, whether
//! the edge originated from firmware (PORT write while DDR=input, toggling
//! the pull-up) or an external level driven onto the pin via
//! `set_pin_level`.

use crate::interrupt::InterruptController;
use crate::peripheral::Peripheral;
use crate::signal::{SignalId, SignalPool};

mod regs {
    pub const DDR: usize = 0;
    pub const PORT: usize = 1;
    pub const PIN: usize = 2;
}

#[derive(Debug)]
pub struct IoPort {
    pub name: char,
    ddr: u8,
    port: u8,
    pin: u8,
    pcmsk: u8,
    pub pcint_vector: Option<usize>,
    out_signals: [SignalId; 8],
    in_signals: [SignalId; 8],
}

impl IoPort {
    pub fn new(pool: &mut SignalPool, name: char) -> Self {
        let out_signals = std::array::from_fn(|bit| pool.alloc_with_flags(format!("1>port{name}.{bit}.out"), false, true));
        let in_signals = std::array::from_fn(|bit| pool.alloc_with_flags(format!("1>port{name}.{bit}.in"), false, true));
        Self { name, ddr: 0, port: 0, pin: 0, pcmsk: 0, pcint_vector: None, out_signals, in_signals }
    }

    pub fn read_reg(&self, which: usize) -> u8 {
        match which {
            regs::DDR => self.ddr,
            regs::PORT => self.port,
            regs::PIN => self.pin,
            _ => 0,
        }
    }

    pub fn write_ddr(&mut self, pool: &mut SignalPool, value: u8) {
        self.ddr = value;
        self.drive_outputs(pool);
    }

    pub fn write_port(&mut self, pool: &mut SignalPool, ic: &mut InterruptController, value: u8) {
        let changed = self.port ^ value;
        self.port = value;
        self.drive_outputs(pool);
        // Writing PORT on an input-configured bit toggles its pull-up,
        // which (absent an external driver) is what the pin reads back.
        let pulled = !self.ddr & self.port;
        let pull_changed = changed & !self.ddr;
        if pull_changed != 0 {
            self.pin = (self.pin & self.ddr) | (pulled & !self.ddr);
            self.check_pcint(pool, ic, pull_changed);
        }
    }

    fn drive_outputs(&mut self, pool: &mut SignalPool) {
        for bit in 0..8 {
            if self.ddr & (1 << bit) != 0 {
                let level = (self.port >> bit) & 1;
                pool.raise(self.out_signals[bit], level as u32);
            }
        }
    }

    /// Drives an external level onto `bit`, independent of DDR - the way a
    /// connected peripheral or test harness models an external signal
    /// source. No effect on bits configured as output (external drive
    /// contention is out of scope).
    pub fn set_pin_level(&mut self, pool: &mut SignalPool, ic: &mut InterruptController, bit: u8, level: bool) {
        if self.ddr & (1 << bit) != 0 {
            return;
        }
        let mask = 1u8 << bit;
        let was = self.pin & mask != 0;
        if was == level {
            return;
        }
        self.pin = (self.pin & !mask) | if level { mask } else { 0 };
        pool.raise(self.in_signals[bit as usize], level as u32);
        self.check_pcint(pool, ic, mask);
    }

    fn check_pcint(&mut self, pool: &mut SignalPool, ic: &mut InterruptController, changed: u8) {
        if changed & self.pcmsk == 0 {
            return;
        }
        if let Some(idx) = self.pcint_vector {
            ic.raise_interrupt(pool, idx, true, || {}, true, false);
        }
    }

    pub fn set_pcmsk(&mut self, value: u8) {
        self.pcmsk = value;
    }

    pub fn pin_level(&self, bit: u8) -> bool {
        self.pin & (1 << bit) != 0
    }
}

impl Peripheral for IoPort {
    fn reset(&mut self) {
        self.ddr = 0;
        self.port = 0;
        self.pin = 0;
        self.pcmsk = 0;
    }
}
