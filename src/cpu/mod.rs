//! AVR CPU core (C5): register file, SREG, program counter, and the
//! fetch-decode-execute loop, including interrupt servicing at
//! instruction boundaries.
//!
//! The general-purpose register file, SREG, and SP all live in the bus's
//! data space (real AVR memory-mapping), so `Cpu` itself holds only what
//! hardware keeps outside that space: the 32 working registers (mirrored
//! here for fast decode access, synced to `[0..32)` in the data space on
//! each read/write), the program counter, and the sleep/break latches.

mod execute;
mod flags;
mod helpers;

use crate::bus::Bus;
use crate::error::Result;
use flags::Sreg;

/// Snapshot size in bytes for `to_bytes`/`from_bytes`: 32 registers + SREG
/// + PC (4 bytes) + sleeping/break flags.
pub const SNAPSHOT_SIZE: usize = 32 + 1 + 4 + 1;

#[derive(Debug)]
pub struct Cpu {
    pub regs: [u8; 32],
    pub sreg: Sreg,
    /// Word address into flash (one AVR instruction word = 2 bytes).
    pub pc: u32,
    pub sleeping: bool,
    pub break_hit: bool,
    /// True for devices with >64 vectors (e.g. atmega2560), which use a
    /// two-word JMP/CALL and a three-byte return address.
    pub pc_is_22bit: bool,
}

impl Cpu {
    pub fn new(pc_is_22bit: bool) -> Self {
        Self { regs: [0; 32], sreg: Sreg::default(), pc: 0, sleeping: false, break_hit: false, pc_is_22bit }
    }

    pub fn reset(&mut self) {
        self.regs = [0; 32];
        self.sreg = Sreg::default();
        self.pc = 0;
        self.sleeping = false;
        self.break_hit = false;
    }

    /// Runs one fetch-decode-execute step, including interrupt servicing
    /// at the instruction boundary (§4.3 "Service"). Returns the number of
    /// core cycles the step consumed.
    pub fn step(&mut self, bus: &mut Bus) -> Result<u64> {
        self.sync_sreg_from_bus(bus);

        if self.sreg.get(flags::I) && bus.peripherals.interrupts.is_servicing_ready() {
            let vector_size = if self.pc_is_22bit { 2 } else { 1 };
            let serviced = bus.peripherals.interrupts.select_for_service(&mut bus.peripherals.pool, |_| true, |_, _| {});
            if let Some((number, _idx)) = serviced {
                self.push_pc(bus, self.pc);
                self.sreg.set(flags::I, false);
                self.sync_sreg_to_bus(bus);
                self.pc = (number as u32 - 1) * vector_size;
                self.sleeping = false;
                return Ok(4);
            }
        }

        bus.peripherals.interrupts.tick_latency();

        if self.sleeping {
            return Ok(1);
        }

        let i_before = self.sreg.get(flags::I);
        let opcode = self.fetch16(bus);
        let cycles = execute::dispatch(self, bus, opcode)?;
        if !i_before && self.sreg.get(flags::I) {
            bus.peripherals.interrupts.arm_sei_latency();
        }
        self.sync_sreg_to_bus(bus);
        Ok(cycles)
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.sreg.get(flags::I)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_SIZE);
        out.extend_from_slice(&self.regs);
        out.push(self.sreg.0);
        out.extend_from_slice(&self.pc.to_le_bytes());
        out.push((self.sleeping as u8) | ((self.break_hit as u8) << 1));
        out
    }

    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != SNAPSHOT_SIZE {
            return Err(crate::error::SimError::SnapshotSize { expected: SNAPSHOT_SIZE, actual: bytes.len() });
        }
        self.regs.copy_from_slice(&bytes[0..32]);
        self.sreg.0 = bytes[32];
        self.pc = u32::from_le_bytes(bytes[33..37].try_into().unwrap());
        self.sleeping = bytes[37] & 1 != 0;
        self.break_hit = bytes[37] & 2 != 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{build_bus, DeviceKind};

    #[test]
    fn reset_clears_registers_and_pc() {
        let mut cpu = Cpu::new(false);
        cpu.regs[5] = 0xAA;
        cpu.pc = 100;
        cpu.reset();
        assert_eq!(cpu.regs[5], 0);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut cpu = Cpu::new(false);
        cpu.regs[3] = 0x77;
        cpu.pc = 42;
        cpu.sreg.0 = 0x81;
        let bytes = cpu.to_bytes();
        let mut restored = Cpu::new(false);
        restored.from_bytes(&bytes).unwrap();
        assert_eq!(restored.regs[3], 0x77);
        assert_eq!(restored.pc, 42);
        assert_eq!(restored.sreg.0, 0x81);
    }

    #[test]
    fn snapshot_rejects_wrong_length() {
        let mut cpu = Cpu::new(false);
        assert!(cpu.from_bytes(&[0; 10]).is_err());
    }

    #[test]
    fn step_executes_nop_and_advances_pc() {
        let mut bus = build_bus(DeviceKind::ATmega168);
        bus.peripherals.flash_ctrl.flash[0] = 0x00;
        bus.peripherals.flash_ctrl.flash[1] = 0x00;
        let mut cpu = Cpu::new(false);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 1);
    }
}
