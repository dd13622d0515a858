//! Error types surfaced to callers of the simulator core.
//!
//! Most failure modes documented by the simulation model (bad opcode, sleep
//! deadlock, scheduler-full during speculative registration) are not
//! caller-visible `Result` errors - they are host-visible states and log
//! lines, matching how a real chip would not hand an error code back to the
//! instruction stream that caused it. `SimError` covers only what a host
//! embedding the core can legitimately fail to do: configure a core, load
//! firmware into it, or round-trip a save state.

use thiserror::Error;

/// Errors returned by core configuration, firmware loading, and snapshotting.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SimError {
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("firmware is {len} bytes, which does not fit in {flash_size}-byte flash")]
    FirmwareTooLarge { len: usize, flash_size: usize },

    #[error("firmware image is empty")]
    FirmwareEmpty,

    #[error("cycle-timer pool exhausted")]
    SchedulerFull,

    #[error("register address {0:#06x} is outside the data space")]
    InvalidRegister(u16),

    #[error("save-state buffer is {actual} bytes, expected {expected}")]
    SnapshotSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, SimError>;
