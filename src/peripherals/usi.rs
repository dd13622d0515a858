//! USI (C11): universal serial interface shift register.
//!
//! Models the 3-wire/2-wire shift path only: an 8-bit shift register and a
//! 4-bit clock counter that increments on a clock edge (software-toggled
//! via USITC, or an external clock sourced through USICS), raising the
//! overflow vector when the counter wraps from 16 to 0.

use crate::interrupt::InterruptController;
use crate::peripheral::Peripheral;
use crate::signal::SignalPool;

#[derive(Debug)]
pub struct Usi {
    shift: u8,
    counter: u8,
    pub clock_external: bool,
    pub overflow_vector: Option<usize>,
}

impl Usi {
    pub fn new() -> Self {
        Self { shift: 0, counter: 0, clock_external: false, overflow_vector: None }
    }

    pub fn data(&self) -> u8 {
        self.shift
    }

    pub fn set_data(&mut self, value: u8) {
        self.shift = value;
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn set_counter(&mut self, value: u8) {
        self.counter = value & 0x0F;
    }

    /// One shift-register clock edge: shifts `data_in` into bit 0, shifts
    /// the register left, and increments the 4-bit counter, reporting
    /// overflow on wrap.
    pub fn clock_edge(&mut self, pool: &mut SignalPool, ic: &mut InterruptController, data_in: bool) {
        self.shift = (self.shift << 1) | data_in as u8;
        self.counter = (self.counter + 1) & 0x0F;
        if self.counter == 0 {
            if let Some(idx) = self.overflow_vector {
                ic.raise_interrupt(pool, idx, true, || {}, true, false);
            }
        }
    }
}

impl Default for Usi {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for Usi {
    fn reset(&mut self) {
        self.shift = 0;
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::RegBit;

    #[test]
    fn clock_edge_shifts_data_in_at_bit_zero() {
        let mut pool = SignalPool::new();
        let mut ic = InterruptController::new(&mut pool);
        let mut usi = Usi::new();
        usi.clock_edge(&mut pool, &mut ic, true);
        assert_eq!(usi.data() & 1, 1);
    }

    #[test]
    fn counter_overflow_raises_vector() {
        let mut pool = SignalPool::new();
        let mut ic = InterruptController::new(&mut pool);
        let idx = ic.register_vector(&mut pool, 2, RegBit::new(0x2D, 6), None, false);
        let mut usi = Usi::new();
        usi.overflow_vector = Some(idx);
        usi.set_counter(15);
        usi.clock_edge(&mut pool, &mut ic, false);
        assert!(ic.select_for_service(&mut pool, |_| true, |_, _| {}).is_some());
    }
}
