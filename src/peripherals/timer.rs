//! Timer/counter (C8): 8-bit or 16-bit counter with waveform generation,
//! output-compare matching, and input capture.
//!
//! Only the waveform modes needed to compute TOP are distinguished (Normal,
//! CTC, Fast PWM, Phase-Correct PWM); the compare-output (COM) pin-toggle
//! behavior itself is left to firmware polling the compare flags or to
//! peripherals outside this module wiring the compare-match signal
//! elsewhere, since this simulator has no modeled analog output pin.
//! Ticking happens once per retired instruction (`tick`), not through the
//! cycle scheduler - the teacher's general-purpose timer used the same
//! per-cycle-batch accumulator style this keeps.

use crate::interrupt::InterruptController;
use crate::peripheral::Peripheral;
use crate::signal::{SignalId, SignalPool};

mod bits {
    pub const CS_MASK: u8 = 0x07;
    pub const WGM01: u8 = 1 << 3;
    pub const WGM1: u8 = 1 << 0;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Wgm {
    Normal,
    Ctc,
    FastPwm,
    PhaseCorrectPwm,
}

#[derive(Debug)]
pub struct Timer {
    pub width16: bool,
    counter: u32,
    ocra: u32,
    ocrb: u32,
    tccra: u8,
    tccrb: u8,
    wgm: Wgm,
    accum: u64,
    direction_up: bool,
    pub ovf_vector: Option<usize>,
    pub compa_vector: Option<usize>,
    pub compb_vector: Option<usize>,
    pub compa_signal: SignalId,
    pub compb_signal: SignalId,
    pub ovf_flag: bool,
    pub compa_flag: bool,
    pub compb_flag: bool,
}

impl Timer {
    pub fn new(pool: &mut SignalPool, name: &str, width16: bool) -> Self {
        Self {
            width16,
            counter: 0,
            ocra: 0,
            ocrb: 0,
            tccra: 0,
            tccrb: 0,
            wgm: Wgm::Normal,
            accum: 0,
            direction_up: true,
            ovf_vector: None,
            compa_vector: None,
            compb_vector: None,
            compa_signal: pool.alloc(format!("1>timer{name}.compa")),
            compb_signal: pool.alloc(format!("1>timer{name}.compb")),
            ovf_flag: false,
            compa_flag: false,
            compb_flag: false,
        }
    }

    fn prescale_divisor(&self) -> u64 {
        match self.tccrb & bits::CS_MASK {
            0 => 0, // stopped
            1 => 1,
            2 => 8,
            3 => 64,
            4 => 256,
            _ => 1024,
        }
    }

    fn top(&self) -> u32 {
        let max = if self.width16 { 0xFFFF } else { 0xFF };
        match self.wgm {
            Wgm::Normal => max,
            Wgm::Ctc => self.ocra,
            Wgm::FastPwm | Wgm::PhaseCorrectPwm => max,
        }
    }

    pub fn counter_value(&self) -> u32 {
        self.counter
    }

    pub fn set_counter(&mut self, value: u32) {
        self.counter = value;
    }

    pub fn ocra(&self) -> u32 {
        self.ocra
    }

    pub fn set_ocra(&mut self, value: u32) {
        self.ocra = value;
    }

    pub fn ocrb(&self) -> u32 {
        self.ocrb
    }

    pub fn set_ocrb(&mut self, value: u32) {
        self.ocrb = value;
    }

    pub fn tccra(&self) -> u8 {
        self.tccra
    }

    pub fn set_tccra(&mut self, value: u8) {
        self.tccra = value;
        self.recompute_wgm();
    }

    pub fn tccrb(&self) -> u8 {
        self.tccrb
    }

    pub fn set_tccrb(&mut self, value: u8) {
        self.tccrb = value;
        self.recompute_wgm();
    }

    fn recompute_wgm(&mut self) {
        let wgm2 = self.tccrb & bits::WGM1 != 0;
        let wgm_low = self.tccra & bits::WGM01;
        self.wgm = match (wgm2, wgm_low) {
            (false, 0) => Wgm::Normal,
            (false, 0x08) => Wgm::Ctc,
            (true, _) => Wgm::FastPwm,
            _ => Wgm::PhaseCorrectPwm,
        };
    }

    /// Advances the counter by `cycles` core cycles, applying the
    /// prescaler, and raises overflow/compare vectors as thresholds are
    /// crossed. Multiple wraps within one call (a long instruction next to
    /// a fast prescaler) are all accounted for.
    pub fn tick(&mut self, cycles: u64, pool: &mut SignalPool, ic: &mut InterruptController) {
        let divisor = self.prescale_divisor();
        if divisor == 0 {
            return;
        }
        self.accum += cycles;
        let ticks = self.accum / divisor;
        self.accum %= divisor;

        for _ in 0..ticks {
            self.step_one(pool, ic);
        }
    }

    fn step_one(&mut self, pool: &mut SignalPool, ic: &mut InterruptController) {
        let top = self.top();

        match self.wgm {
            Wgm::PhaseCorrectPwm => {
                if self.direction_up {
                    if self.counter >= top {
                        self.direction_up = false;
                        self.counter = top.saturating_sub(1);
                    } else {
                        self.counter += 1;
                    }
                } else if self.counter == 0 {
                    self.direction_up = true;
                    self.raise_ovf(pool, ic);
                } else {
                    self.counter -= 1;
                }
            }
            _ => {
                self.counter += 1;
                if self.counter > top {
                    self.counter = 0;
                    self.raise_ovf(pool, ic);
                }
            }
        }

        if self.counter == self.ocra {
            self.compa_flag = true;
            pool.raise(self.compa_signal, 1);
            if let Some(idx) = self.compa_vector {
                ic.raise_interrupt(pool, idx, true, || {}, true, false);
            }
        }
        if self.counter == self.ocrb {
            self.compb_flag = true;
            pool.raise(self.compb_signal, 1);
            if let Some(idx) = self.compb_vector {
                ic.raise_interrupt(pool, idx, true, || {}, true, false);
            }
        }
    }

    fn raise_ovf(&mut self, pool: &mut SignalPool, ic: &mut InterruptController) {
        self.ovf_flag = true;
        if let Some(idx) = self.ovf_vector {
            ic.raise_interrupt(pool, idx, true, || {}, true, false);
        }
    }
}

impl Peripheral for Timer {
    fn reset(&mut self) {
        self.counter = 0;
        self.ocra = 0;
        self.ocrb = 0;
        self.tccra = 0;
        self.tccrb = 0;
        self.wgm = Wgm::Normal;
        self.accum = 0;
        self.direction_up = true;
        self.ovf_flag = false;
        self.compa_flag = false;
        self.compb_flag = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(width16: bool) -> (Timer, SignalPool, InterruptController) {
        let mut pool = SignalPool::new();
        let ic = InterruptController::new(&mut pool);
        let timer = Timer::new(&mut pool, "0", width16);
        (timer, pool, ic)
    }

    #[test]
    fn normal_mode_8bit_overflows_at_256_ticks() {
        let (mut t, mut pool, mut ic) = setup(false);
        t.set_tccrb(1); // CS=1, no prescale
        t.tick(255, &mut pool, &mut ic);
        assert!(!t.ovf_flag);
        t.tick(1, &mut pool, &mut ic);
        assert!(t.ovf_flag);
        assert_eq!(t.counter_value(), 0);
    }

    #[test]
    fn ctc_mode_resets_at_ocra_and_raises_compa() {
        let (mut t, mut pool, mut ic) = setup(false);
        t.set_tccra(bits::WGM01);
        t.set_tccrb(1);
        t.set_ocra(10);
        t.tick(10, &mut pool, &mut ic);
        assert!(t.compa_flag);
        assert_eq!(t.counter_value(), 0);
    }

    #[test]
    fn prescaler_divides_cycle_count() {
        let (mut t, mut pool, mut ic) = setup(false);
        t.set_tccrb(3); // CS=3, div 64
        t.tick(63, &mut pool, &mut ic);
        assert_eq!(t.counter_value(), 0);
        t.tick(1, &mut pool, &mut ic);
        assert_eq!(t.counter_value(), 1);
    }

    #[test]
    fn stopped_clock_does_not_advance_counter() {
        let (mut t, mut pool, mut ic) = setup(false);
        t.tick(1000, &mut pool, &mut ic);
        assert_eq!(t.counter_value(), 0);
    }

    #[test]
    fn compb_raises_vector_when_configured() {
        let (mut t, mut pool, mut ic) = setup(false);
        let idx = ic.register_vector(&mut pool, 9, crate::interrupt::RegBit::new(0x6E, 2), None, false);
        t.compb_vector = Some(idx);
        t.set_tccrb(1);
        t.set_ocrb(5);
        t.tick(5, &mut pool, &mut ic);
        assert!(ic.select_for_service(&mut pool, |_| true, |_, _| {}).is_some());
    }

    #[test]
    fn width16_overflows_at_65536_ticks() {
        let (mut t, mut pool, mut ic) = setup(true);
        t.set_tccrb(1);
        t.tick(0xFFFF, &mut pool, &mut ic);
        assert!(!t.ovf_flag);
        t.tick(1, &mut pool, &mut ic);
        assert!(t.ovf_flag);
    }
}
