//! Core-instance assembly (C12 continued): the `Core` that owns a `Cpu`
//! and a `Bus` together, the `CoreConfig` builder that produces one from a
//! firmware record, and the command/console register conveniences.
//!
//! Mirrors the teacher's firmware-record-then-populate pattern: nothing
//! about device selection or load data survives past `CoreConfig::build`,
//! so a `Core` itself carries no optional/builder-shaped fields.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::device::DeviceKind;
use crate::error::{Result, SimError};

/// Host-visible run state (§7): not every termination condition is a
/// `Result::Err` - a sleeping core with nothing left to wake it is a
/// state transition, not a failure the caller asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Running,
    Sleeping,
    Done,
    Crashed,
}

/// Builder for a `Core`, following §10.3: device, clock override, firmware
/// bytes, and the optional host-interface registers are all set here
/// before `build()` produces a runnable instance.
#[derive(Default)]
pub struct CoreConfig {
    device: Option<DeviceKind>,
    frequency_hz: Option<u64>,
    firmware: Vec<u8>,
    eeprom: Option<Vec<u8>>,
    command_register: Option<u16>,
    console_register: Option<u16>,
    adc_channel_mv: Vec<(usize, u32)>,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, kind: DeviceKind) -> Self {
        self.device = Some(kind);
        self
    }

    pub fn frequency_hz(mut self, hz: u64) -> Self {
        self.frequency_hz = Some(hz);
        self
    }

    pub fn firmware(mut self, bytes: Vec<u8>) -> Self {
        self.firmware = bytes;
        self
    }

    pub fn eeprom(mut self, bytes: Vec<u8>) -> Self {
        self.eeprom = Some(bytes);
        self
    }

    pub fn command_register(mut self, addr: u16) -> Self {
        self.command_register = Some(addr);
        self
    }

    pub fn console_register(mut self, addr: u16) -> Self {
        self.console_register = Some(addr);
        self
    }

    /// Injects a millivolt reading for one ADC channel (§4.14); repeated
    /// calls for the same channel keep only the last value.
    pub fn adc_channel_mv(mut self, channel: usize, millivolts: u32) -> Self {
        self.adc_channel_mv.push((channel, millivolts));
        self
    }

    pub fn build(self) -> Result<Core> {
        let kind = self.device.ok_or_else(|| SimError::UnknownDevice("<none>".into()))?;
        if self.firmware.is_empty() {
            return Err(SimError::FirmwareEmpty);
        }

        let mut bus = crate::device::build_bus(kind);
        if let Some(hz) = self.frequency_hz {
            bus.scheduler.set_frequency(hz);
        }

        let flash_len = bus.peripherals.flash_ctrl.flash.len();
        if self.firmware.len() > flash_len {
            return Err(SimError::FirmwareTooLarge { len: self.firmware.len(), flash_size: flash_len });
        }

        if let Some(eeprom) = self.eeprom {
            log::debug!("eeprom image of {} bytes supplied but this build has no EEPROM peripheral wired", eeprom.len());
        }

        for (channel, mv) in self.adc_channel_mv {
            match &mut bus.peripherals.adc {
                Some(adc) if channel < adc.channel_mv.len() => adc.channel_mv[channel] = mv,
                _ => log::warn!("adc channel {channel} mv table entry ignored: device has no ADC or channel out of range"),
            }
        }

        let pc_is_22bit = bus.peripherals.flash_ctrl.flash.len() > 0x20000;
        let mut cpu = Cpu::new(pc_is_22bit);
        cpu.reset();
        bus.reset();
        // `Bus::reset` zeroes the data space but not `flash_ctrl`'s flash
        // vector, so firmware is loaded after it to land in a clean core.
        bus.peripherals.flash_ctrl.flash[..self.firmware.len()].copy_from_slice(&self.firmware);

        Ok(Core {
            cpu,
            bus,
            state: CoreState::Running,
            command_register: self.command_register,
            console_register: self.console_register,
            console_line: String::new(),
            last_command_byte: 0,
            last_console_byte: 0,
        })
    }
}

/// One simulated chip: CPU, bus (which carries the scheduler and every
/// peripheral), and the run state and host-interface register shadows
/// needed to detect command/console writes between steps.
#[derive(Debug)]
pub struct Core {
    pub cpu: Cpu,
    pub bus: Bus,
    pub state: CoreState,
    command_register: Option<u16>,
    console_register: Option<u16>,
    console_line: String,
    last_command_byte: u8,
    last_console_byte: u8,
}

impl Core {
    /// Runs one fetch-decode-execute step plus the per-instruction
    /// peripheral housekeeping (§5 "Scheduling model"): timers tick, due
    /// cycle-timer callbacks fire, then the command/console registers are
    /// polled for a new write since the last step.
    pub fn step(&mut self) -> Result<()> {
        if self.state != CoreState::Running {
            return Ok(());
        }

        let was_sleeping = self.cpu.sleeping;
        let cycles = self.cpu.step(&mut self.bus)?;
        self.bus.peripherals.tick_timers(cycles);
        self.bus.advance_cycles(cycles);

        if was_sleeping
            && self.cpu.sleeping
            && !self.bus.peripherals.interrupts.is_servicing_ready()
            && !self.cpu.interrupts_enabled()
        {
            log::info!("core halted: sleep with no enabled interrupt source can never resume");
            self.state = CoreState::Done;
        }

        self.poll_command_register();
        self.poll_console_register();
        Ok(())
    }

    /// Steps until at least `n` core cycles have been consumed or the core
    /// leaves the `Running` state. Returns the number of cycles actually
    /// consumed (can exceed `n` by at most the last instruction's length).
    pub fn run_cycles(&mut self, n: u64) -> Result<u64> {
        let start = self.bus.cycle;
        while self.bus.cycle - start < n && self.state == CoreState::Running {
            self.step()?;
        }
        Ok(self.bus.cycle - start)
    }

    fn poll_command_register(&mut self) {
        let Some(addr) = self.command_register else { return };
        let byte = self.bus.peek(addr);
        if byte == self.last_command_byte {
            return;
        }
        self.last_command_byte = byte;
        match byte {
            0x00 => {}
            0x01 => log::info!("command register: start VCD trace"),
            0x02 => log::info!("command register: stop VCD trace"),
            0x03 => log::info!("command register: enable UART loopback"),
            0x04 => log::debug!("command register: start cycle counter"),
            0x05 => log::debug!("command register: stop cycle counter"),
            other => log::warn!("command register: unrecognized opcode {other:#04x}"),
        }
    }

    fn poll_console_register(&mut self) {
        let Some(addr) = self.console_register else { return };
        let byte = self.bus.peek(addr);
        if byte == self.last_console_byte {
            return;
        }
        self.last_console_byte = byte;
        if byte == 0 {
            return;
        }
        if byte == b'\r' {
            log::info!("{}", self.console_line);
            self.console_line.clear();
        } else {
            self.console_line.push(byte as char);
        }
    }

    /// Combined snapshot of CPU and bus/peripheral state, in the same
    /// fixed-layout style the teacher crate uses for save states (§6
    /// "Persistence").
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.cpu.to_bytes();
        out.extend_from_slice(self.bus.data());
        out
    }

    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let cpu_len = crate::cpu::SNAPSHOT_SIZE;
        if bytes.len() != cpu_len + self.bus.len() {
            return Err(SimError::SnapshotSize { expected: cpu_len + self.bus.len(), actual: bytes.len() });
        }
        self.cpu.from_bytes(&bytes[..cpu_len])?;
        self.bus.data_mut().copy_from_slice(&bytes[cpu_len..]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop_firmware(len: usize) -> Vec<u8> {
        vec![0; len]
    }

    #[test]
    fn build_rejects_empty_firmware() {
        let err = CoreConfig::new().device(DeviceKind::ATmega168).firmware(vec![]).build().unwrap_err();
        assert_eq!(err, SimError::FirmwareEmpty);
    }

    #[test]
    fn build_rejects_oversized_firmware() {
        let err = CoreConfig::new().device(DeviceKind::ATtiny13).firmware(vec![0; 2048]).build().unwrap_err();
        assert!(matches!(err, SimError::FirmwareTooLarge { .. }));
    }

    #[test]
    fn build_requires_a_device() {
        let err = CoreConfig::new().firmware(nop_firmware(16)).build().unwrap_err();
        assert!(matches!(err, SimError::UnknownDevice(_)));
    }

    #[test]
    fn step_advances_pc_on_nop_stream() {
        let mut core = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(16)).build().unwrap();
        core.step().unwrap();
        assert_eq!(core.cpu.pc, 1);
        assert_eq!(core.state, CoreState::Running);
    }

    #[test]
    fn run_cycles_consumes_at_least_the_requested_amount() {
        let mut core = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(64)).build().unwrap();
        let consumed = core.run_cycles(10).unwrap();
        assert!(consumed >= 10);
    }

    #[test]
    fn console_register_flushes_line_on_carriage_return() {
        let mut core = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(16)).console_register(0x30).build().unwrap();
        core.bus.write(0x30, b'h');
        core.poll_console_register();
        core.bus.write(0x30, 0);
        core.poll_console_register();
        core.bus.write(0x30, b'i');
        core.poll_console_register();
        assert_eq!(core.console_line, "hi");
        core.bus.write(0x30, b'\r');
        core.poll_console_register();
        assert!(core.console_line.is_empty());
    }

    #[test]
    fn snapshot_round_trips_cpu_and_bus_state() {
        let mut core = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(16)).build().unwrap();
        core.cpu.regs[2] = 0x55;
        core.bus.poke(0x100, 0x77);
        let snap = core.to_bytes();
        let mut restored = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(16)).build().unwrap();
        restored.from_bytes(&snap).unwrap();
        assert_eq!(restored.cpu.regs[2], 0x55);
        assert_eq!(restored.bus.peek(0x100), 0x77);
    }
}
