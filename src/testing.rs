//! Shared helpers for the unit tests.

use crate::register::Setting;
use crate::{preset, Calibration, VL53L3cx};
use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

/// Bus address used throughout the tests.
pub const ADDR: u8 = crate::DEFAULT_ADDRESS;

/// Expect a register write of `payload`.
pub fn write(register: u16, payload: &[u8]) -> Transaction {
    let mut bytes = register.to_be_bytes().to_vec();
    bytes.extend_from_slice(payload);
    Transaction::write(ADDR, bytes)
}

/// Expect a register read answering with `response`.
pub fn read(register: u16, response: &[u8]) -> Transaction {
    Transaction::write_read(ADDR, register.to_be_bytes().to_vec(), response.to_vec())
}

/// Expect a write of one preset entry.
pub fn write_setting(setting: &Setting) -> Transaction {
    let (payload, len) = setting.to_be_bytes();
    write(setting.register.into(), &payload[..len])
}

/// Expect a readback of one preset entry returning the written value.
pub fn read_setting(setting: &Setting) -> Transaction {
    let (payload, len) = setting.to_be_bytes();
    read(setting.register.into(), &payload[..len])
}

/// Grouped hold transactions framing the two dynamic batches.
pub fn dynamic_writes(first: &[Setting], second: &[Setting]) -> Vec<Transaction> {
    let mut expectations = vec![write(0x0071, &[preset::GROUPED_HOLD_OPEN])];
    expectations.extend(first.iter().map(write_setting));
    expectations.push(write(0x007C, &[preset::GROUPED_HOLD_OPEN]));
    expectations.extend(second.iter().map(write_setting));
    expectations.push(write(0x0082, &[preset::GROUPED_HOLD_APPLY]));
    expectations
}

/// Every transaction `load_preset` issues.
pub fn preset_writes() -> Vec<Transaction> {
    let mut expectations: Vec<Transaction> = preset::STATIC
        .iter()
        .chain(preset::GENERAL.iter())
        .chain(preset::TIMING.iter())
        .map(write_setting)
        .collect();
    expectations.extend(dynamic_writes(&preset::DYNAMIC_FIRST, &preset::DYNAMIC_SECOND));
    expectations
}

/// Writes that open the NVM read window.
pub fn nvm_power_up() -> Vec<Transaction> {
    vec![
        write(0x0085, &[0x00]),
        write(0x0083, &[0x01]),
        write(0x0680, &[0x01]),
        write(0x0683, &[0x05]),
        write(0x0681, &[0x01]),
        write(0x0682, &[0x00, 0x04]),
    ]
}

/// Writes that close the NVM read window.
pub fn nvm_power_down() -> Vec<Transaction> {
    vec![
        write(0x0683, &[0x01]),
        write(0x0680, &[0x00]),
        write(0x0083, &[0x00]),
        write(0x0085, &[0x01]),
    ]
}

/// Strobed read of one NVM word answering with `value`.
pub fn nvm_word(nvm_address: u8, value: [u8; 4]) -> Vec<Transaction> {
    vec![
        write(0x0684, &[nvm_address]),
        write(0x0685, &[0x00]),
        write(0x0685, &[0x01]),
        read(0x0686, &value),
    ]
}

/// Delay provider that records every requested wait.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    /// Individual waits in nanoseconds, in call order
    pub waits_ns: Vec<u64>,
}

impl RecordingDelay {
    /// Sum of all waits in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.waits_ns.iter().sum()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_ns.push(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.waits_ns.push(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ns.push(u64::from(ms) * 1_000_000);
    }
}

/// Calibration used by tests that skip the NVM readout.
pub const CALIBRATION: Calibration = Calibration {
    fast_osc_frequency: crate::histogram::NOMINAL_FAST_OSC_FREQUENCY,
    default_address: ADDR,
    vhv_timeout_bound: 0x09,
};

/// Builds a driver already in `state`, talking to `i2c`.
pub fn sensor_in<S>(i2c: I2cMock, state: S) -> VL53L3cx<I2cMock, RecordingDelay, S> {
    VL53L3cx::new(i2c, RecordingDelay::default()).into_state(state)
}
