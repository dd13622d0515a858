//! External interrupt (C9): one INTn line with a configurable sense mode.
//!
//! Sense mode mirrors the EICRA/EICRB `ISCn1:0` encoding: low level,
//! any logical change, falling edge, rising edge. Low-level sensing is
//! "live" rather than edge-latched: as long as the pin reads low and the
//! vector is enabled, the line keeps re-asserting every time `poll` sees
//! it, which is what lets firmware wake from sleep on a held-low line.

use crate::interrupt::InterruptController;
use crate::peripheral::Peripheral;
use crate::signal::SignalPool;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SenseMode {
    LowLevel,
    AnyChange,
    FallingEdge,
    RisingEdge,
}

impl SenseMode {
    pub fn from_isc(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => SenseMode::LowLevel,
            0b01 => SenseMode::AnyChange,
            0b10 => SenseMode::FallingEdge,
            _ => SenseMode::RisingEdge,
        }
    }
}

#[derive(Debug)]
pub struct ExtInt {
    pub vector: usize,
    pub sense: SenseMode,
    last_level: bool,
    pub enabled: bool,
}

impl ExtInt {
    pub fn new(vector: usize) -> Self {
        Self { vector, sense: SenseMode::LowLevel, last_level: true, enabled: false }
    }

    /// Called whenever the wired pin's level may have changed (from an
    /// `IoPort::set_pin_level` or a PORT write toggling a pull-up).
    /// Returns whether the vector was (re)raised.
    pub fn poll(&mut self, pool: &mut SignalPool, ic: &mut InterruptController, level: bool) -> bool {
        let edge_matches = match self.sense {
            SenseMode::LowLevel => !level,
            SenseMode::AnyChange => level != self.last_level,
            SenseMode::FallingEdge => self.last_level && !level,
            SenseMode::RisingEdge => !self.last_level && level,
        };
        self.last_level = level;

        if !self.enabled || !edge_matches {
            return false;
        }
        ic.raise_interrupt(pool, self.vector, true, || {}, true, false)
    }
}

impl Peripheral for ExtInt {
    fn reset(&mut self) {
        self.sense = SenseMode::LowLevel;
        self.last_level = true;
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::RegBit;

    fn setup() -> (ExtInt, SignalPool, InterruptController) {
        let mut pool = SignalPool::new();
        let mut ic = InterruptController::new(&mut pool);
        let idx = ic.register_vector(&mut pool, 1, RegBit::new(0x3D, 0), None, false);
        let mut e = ExtInt::new(idx);
        e.enabled = true;
        (e, pool, ic)
    }

    #[test]
    fn falling_edge_mode_ignores_rising_edge() {
        let (mut e, mut pool, mut ic) = setup();
        e.sense = SenseMode::FallingEdge;
        e.last_level = false;
        assert!(!e.poll(&mut pool, &mut ic, true));
    }

    #[test]
    fn falling_edge_mode_fires_on_falling_edge() {
        let (mut e, mut pool, mut ic) = setup();
        e.sense = SenseMode::FallingEdge;
        e.last_level = true;
        assert!(e.poll(&mut pool, &mut ic, false));
    }

    #[test]
    fn low_level_mode_refires_while_held_low() {
        let (mut e, mut pool, mut ic) = setup();
        e.sense = SenseMode::LowLevel;
        assert!(e.poll(&mut pool, &mut ic, false));
        ic.select_for_service(&mut pool, |_| true, |_, _| {}).unwrap();
        assert!(e.poll(&mut pool, &mut ic, false));
    }

    #[test]
    fn disabled_line_never_fires() {
        let (mut e, mut pool, mut ic) = setup();
        e.enabled = false;
        e.sense = SenseMode::AnyChange;
        assert!(!e.poll(&mut pool, &mut ic, true));
    }
}
