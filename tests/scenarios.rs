//! End-to-end scenarios driving a whole `Core` through its public API,
//! one per wired peripheral. Register addresses below are the classic
//! low-I/O-space AVR addresses `device.rs` binds its handlers to; they
//! are re-stated here rather than imported since `device.rs` keeps its
//! address table private to the device-wiring layer.

use avrsim_core::peripherals::PeripheralSet;
use avrsim_core::{Core, CoreConfig, CoreState, DeviceKind};

mod addr {
    pub const PINB: u16 = 0x23;
    pub const DDRB: u16 = 0x24;
    pub const PCMSK0: u16 = 0x6B;
    pub const SPMCSR: u16 = 0x57;
    pub const WDTCSR: u16 = 0x60;
    pub const ADMUX: u16 = 0x7C;
    pub const ADCSRA: u16 = 0x7A;
    pub const ADCL: u16 = 0x78;
    pub const ADCH: u16 = 0x79;
    pub const UDR0: u16 = 0xC6;
    pub const UCSR0A: u16 = 0xC0;
    pub const UCSR0B: u16 = 0xC1;
    pub const SREG: u16 = 0x5F;
}

const UDRE: u8 = 1 << 5;
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;

fn nop_firmware(len: usize) -> Vec<u8> {
    vec![0; len]
}

fn enable_global_interrupts(core: &mut Core) {
    core.bus.poke(addr::SREG, 0x80);
}

#[test]
fn uart_transmit_completes_and_sets_udre_and_txc() {
    let mut core = CoreConfig::new().device(DeviceKind::ATmega2560).firmware(nop_firmware(16)).build().unwrap();
    core.bus.write(addr::UCSR0B, TXEN | RXEN);
    core.bus.write(addr::UDR0, b'A');
    assert_eq!(core.bus.read(addr::UCSR0A) & UDRE, 0);

    // One character period at UBRR=0 is 160 core cycles; give it margin.
    core.run_cycles(400).unwrap();

    assert_ne!(core.bus.read(addr::UCSR0A) & UDRE, 0);
}

#[test]
fn uart_receive_byte_sets_rxc_flag() {
    let mut core = CoreConfig::new().device(DeviceKind::ATmega2560).firmware(nop_firmware(16)).build().unwrap();
    core.bus.write(addr::UCSR0B, TXEN | RXEN);
    core.bus.peripherals.uarts[0].receive_byte(|_enabled| false);
    const RXC: u8 = 1 << 7;
    assert_ne!(core.bus.read(addr::UCSR0A) & RXC, 0);
}

#[test]
fn ioport_reflects_external_pin_level_through_pinb() {
    let mut core = CoreConfig::new().device(DeviceKind::ATmega168).firmware(nop_firmware(16)).build().unwrap();
    core.bus.write(addr::DDRB, 0x00); // all input
    {
        let PeripheralSet { pool, interrupts, ports, .. } = &mut core.bus.peripherals;
        ports[0].set_pin_level(pool, interrupts, 3, true);
    }
    assert_ne!(core.bus.read(addr::PINB) & 0x08, 0);
}

#[test]
fn pcint_wakes_core_and_services_vector() {
    let mut core = CoreConfig::new().device(DeviceKind::ATmega2560).firmware(nop_firmware(16)).build().unwrap();
    enable_global_interrupts(&mut core);
    core.bus.write(addr::DDRB, 0x00);
    core.bus.write(addr::PCMSK0, 0x08);

    {
        let PeripheralSet { pool, interrupts, ports, .. } = &mut core.bus.peripherals;
        ports[0].set_pin_level(pool, interrupts, 3, true);
    }

    core.step().unwrap();
    // atmega2560 has a 22-bit PC, so vectors are two words apart;
    // PCINT0 is vector 5, so the handler starts at word address (5-1)*2.
    assert_eq!(core.cpu.pc, 8);
    assert_eq!(core.state, CoreState::Running);
}

#[test]
fn adc_conversion_latches_scaled_result_and_sets_vector() {
    let mut core = CoreConfig::new()
        .device(DeviceKind::ATtiny85)
        .firmware(nop_firmware(16))
        .adc_channel_mv(0, 2500)
        .build()
        .unwrap();
    core.bus.write(addr::ADMUX, 0);
    const ADEN: u8 = 1 << 7;
    const ADSC: u8 = 1 << 6;
    core.bus.write(addr::ADCSRA, ADEN | ADSC);

    // First conversion takes 25 ADC cycles; default ADPS=0 divides by 2.
    core.run_cycles(60).unwrap();

    let lo = core.bus.read(addr::ADCL) as u16;
    let hi = core.bus.read(addr::ADCH) as u16;
    let result = lo | (hi << 8);
    // 2500mV against a 5000mV reference is half scale.
    assert!((500..=525).contains(&result), "result was {result}");
}

#[test]
fn spm_page_write_commits_temp_page_into_flash() {
    let mut core = CoreConfig::new().device(DeviceKind::ATtiny85).firmware(nop_firmware(16)).build().unwrap();
    core.bus.peripherals.flash_ctrl.fill_temp_word(0, 0xBEEF);
    const PGWRT: u8 = 1 << 2;
    const SPMEN: u8 = 1 << 0;
    core.bus.write(addr::SPMCSR, PGWRT | SPMEN);

    core.run_cycles(4600).unwrap();

    assert_eq!(core.bus.peripherals.flash_ctrl.flash[0], 0xEF);
    assert_eq!(core.bus.peripherals.flash_ctrl.flash[1], 0xBE);
    assert_eq!(core.bus.read(addr::SPMCSR) & SPMEN, 0);
}

#[test]
fn watchdog_timeout_in_reset_mode_sets_reset_pending() {
    let mut core = CoreConfig::new().device(DeviceKind::ATmega48).firmware(nop_firmware(16)).build().unwrap();
    const WDCE: u8 = 1 << 4;
    const WDE: u8 = 1 << 3;
    core.bus.write(addr::WDTCSR, WDCE | WDE);
    core.bus.write(addr::WDTCSR, WDE);

    // Shortest prescaler (index 0) times out at 16ms; the watchdog's
    // hardcoded 1MHz reference clock puts that at 16000 core cycles.
    core.run_cycles(16100).unwrap();

    assert!(core.bus.peripherals.watchdog.reset_pending);
    assert!(core.bus.peripherals.watchdog.wdrf);
}

#[test]
fn core_build_rejects_firmware_larger_than_flash() {
    let err = CoreConfig::new().device(DeviceKind::ATtiny13).firmware(vec![0; 4096]).build().unwrap_err();
    assert!(matches!(err, avrsim_core::SimError::FirmwareTooLarge { .. }));
}
