//! # VL53L3CX Histogram Ranging Driver
//!
//! This crate provides a `no_std` driver core for ST-Microelectronics' VL53L3CX class
//! time-of-flight sensors that report a 24-bin photon histogram. The driver brings the
//! device up, extracts its factory calibration from NVM, loads the medium range preset
//! and turns each histogram into a sub-millimetre distance estimate.
//!
//! The device handle is typed by its lifecycle state, so calling an operation in the
//! wrong phase (reading NVM before boot, reading results before ranging started) does
//! not compile:
//!
//! ```text
//! PoweredOn → Booted → (NvmEnabled ↔ Booted) → Calibrated → Configured ⇄ Ranging
//! ```
//!
//! A failed transition returns a [`TransitionError`] that hands the handle back in its
//! previous state, so the caller decides whether to retry, reset or release the bus.
//!
//! The driver is blocking by default. Enable the `async` feature to build the same API
//! on top of `embedded-hal-async`.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! # #[cfg(not(feature = "async"))]
//! # fn main() {
//! use vl53l3cx_hist::VL53L3cx;
//!
//! let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! let delay = embedded_hal_mock::eh1::delay::NoopDelay;
//! let sensor = VL53L3cx::new(i2c, delay);
//!
//! // Boot, read calibration from NVM and load the medium range preset
//! let sensor = sensor.init().unwrap();
//! let mut sensor = sensor.start().unwrap();
//!
//! for _ in 0..10 {
//!     match sensor.next_measurement() {
//!         Ok(estimate) => println!("Distance: {} mm", estimate.distance_mm),
//!         Err(e) => println!("Measurement failed: {e}"),
//!     }
//! }
//!
//! let _sensor = sensor.stop().unwrap();
//! # }
//! # #[cfg(feature = "async")]
//! # fn main() {}
//! ```
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod fmt; // <-- must be first module!

pub mod boot;
pub mod bus;
pub mod config;
pub mod histogram;
pub mod nvm;
pub mod preset;
pub mod ranging;
pub mod register;
pub mod settings;

#[cfg(all(test, not(feature = "async")))]
mod testing;

#[cfg(not(feature = "async"))]
use embedded_hal::{delay::DelayNs, i2c::I2c};
#[cfg(feature = "async")]
use embedded_hal_async::{delay::DelayNs, i2c::I2c};

pub use histogram::{BinWidthPolicy, DistanceEstimate, HistogramResult, RangeStatus};
pub use nvm::{Calibration, NvmField};
pub use register::{Register, Setting, Width};
pub use settings::{Config, EstimatorConfig};

/// Factory default 7-bit I2C address.
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Interrupt configuration options.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptOn {
    /// Interrupt triggered on level low detection
    LevelLow,
    /// Interrupt triggered on level high detection
    LevelHigh,
    /// Interrupt triggered when distance is out of threshold window
    OutOfWindow,
    /// Interrupt triggered when distance is within threshold window
    InWindow,
    /// Interrupt triggered when new ranging data is available
    NewSampleReady,
    /// Custom interrupt configuration value
    Unknown(u8),
}

impl From<InterruptOn> for u8 {
    fn from(interrupt_on: InterruptOn) -> Self {
        match interrupt_on {
            InterruptOn::LevelLow => 0,
            InterruptOn::LevelHigh => 1,
            InterruptOn::OutOfWindow => 2,
            InterruptOn::InWindow => 3,
            InterruptOn::NewSampleReady => preset::INTERRUPT_ON_NEW_SAMPLE,
            InterruptOn::Unknown(value) => value,
        }
    }
}

impl From<u8> for InterruptOn {
    fn from(value: u8) -> Self {
        match value {
            0 => InterruptOn::LevelLow,
            1 => InterruptOn::LevelHigh,
            2 => InterruptOn::OutOfWindow,
            3 => InterruptOn::InWindow,
            preset::INTERRUPT_ON_NEW_SAMPLE => InterruptOn::NewSampleReady,
            _ => {
                warn!("Unknown InterruptOn value: {}", value);
                InterruptOn::Unknown(value)
            }
        }
    }
}

/// Device powered, firmware boot not yet confirmed.
#[derive(Debug)]
pub struct PoweredOn;

/// Firmware booted; registers are meaningful from here on.
#[derive(Debug)]
pub struct Booted;

/// NVM read path enabled; [`read_nvm`](VL53L3cx::read_nvm) is only available here.
#[derive(Debug)]
pub struct NvmEnabled;

/// Factory calibration read from NVM.
#[derive(Debug)]
pub struct Calibrated(Calibration);

/// Medium range preset loaded.
#[derive(Debug)]
pub struct Configured(Calibration);

/// Continuous histogram ranging active.
#[derive(Debug)]
pub struct Ranging(Calibration);

/// States that carry the calibration read from NVM.
pub trait CalibratedState {
    /// Calibration read during bring-up.
    fn calibration(&self) -> &Calibration;
}

impl CalibratedState for Calibrated {
    fn calibration(&self) -> &Calibration {
        &self.0
    }
}

impl CalibratedState for Configured {
    fn calibration(&self) -> &Calibration {
        &self.0
    }
}

impl CalibratedState for Ranging {
    fn calibration(&self) -> &Calibration {
        &self.0
    }
}

/// VL53L3CX histogram ranging driver.
///
/// The handle owns the bus, the delay provider and the device's current bus address.
/// `S` is the lifecycle state; see the crate documentation for the transitions.
pub struct VL53L3cx<I2C, D, S = PoweredOn> {
    /// I2C interface for communication with the sensor
    i2c: I2C,
    /// Current 7-bit I2C address of the sensor
    address: u8,
    /// Delay implementation for timing operations
    delay: D,
    /// Timeouts and estimator policy
    config: Config,
    /// Lifecycle state
    state: S,
}

impl<I2C, D> VL53L3cx<I2C, D, PoweredOn> {
    /// Creates a driver for a freshly powered sensor at the default address, using
    /// the default [`Config`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # #[cfg(not(feature = "async"))]
    /// # fn main() {
    /// use vl53l3cx_hist::VL53L3cx;
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    ///
    /// let sensor = VL53L3cx::new(i2c, delay);
    /// assert_eq!(sensor.address(), 0x29);
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_config(i2c, delay, Config::default())
    }

    /// Creates a driver with an explicit configuration.
    pub fn with_config(i2c: I2C, delay: D, config: Config) -> Self {
        Self {
            i2c,
            address: DEFAULT_ADDRESS,
            delay,
            config,
            state: PoweredOn,
        }
    }
}

impl<I2C, D, S> VL53L3cx<I2C, D, S> {
    /// Current 7-bit bus address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Driver configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Releases the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn into_state<T>(self, state: T) -> VL53L3cx<I2C, D, T> {
        VL53L3cx {
            i2c: self.i2c,
            address: self.address,
            delay: self.delay,
            config: self.config,
            state,
        }
    }
}

impl<I2C, D, S: CalibratedState> VL53L3cx<I2C, D, S> {
    /// Calibration read from NVM during bring-up.
    pub fn calibration(&self) -> &Calibration {
        self.state.calibration()
    }
}

/// Error type for driver operations.
///
/// No operation retries on its own; the variant tells the caller which retry policy
/// makes sense.
///
/// # Examples
///
/// ```rust,no_run
/// # #[cfg(not(feature = "async"))]
/// # fn main() {
/// use vl53l3cx_hist::{Error, VL53L3cx};
///
/// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
/// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
/// let sensor = VL53L3cx::new(i2c, delay);
///
/// match sensor.init() {
///     Ok(_) => println!("Sensor configured"),
///     Err(failed) => match failed.error() {
///         Error::BootTimeout => println!("Sensor never booted"),
///         Error::NvmReadFailure(e) => println!("NVM readout failed: {:?}", e),
///         e => println!("Bring-up failed: {:?}", e),
///     },
/// }
/// # }
/// # #[cfg(feature = "async")]
/// # fn main() {}
/// ```
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: core::fmt::Debug> {
    /// I2C communication error from the underlying hardware
    I2cError(E),
    /// Boot flag not set within the boot timeout
    BootTimeout,
    /// Transport error while the NVM path was enabled
    NvmReadFailure(E),
    /// Requested bus address outside `0x08..=0x77`
    InvalidAddress(u8),
    /// Data ready flag not set within the measurement timeout
    MeasurementTimeout,
    /// Device reported a range status other than "range complete"; carries the raw byte
    RangeStatusError(u8),
    /// Invalid parameter value provided
    InvalidArgument,
    /// A preset register read back a different value than was written
    PresetMismatch {
        /// Register address
        register: u16,
        /// Value written by the preset
        expected: u32,
        /// Value read back
        actual: u32,
    },
}

impl<E: core::fmt::Debug> Error<E> {
    /// Reclassifies a transport error as an NVM readout failure.
    fn into_nvm(self) -> Self {
        match self {
            Error::I2cError(e) => Error::NvmReadFailure(e),
            other => other,
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<E: core::fmt::Debug> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::I2cError(error)
    }
}

/// A state transition that failed.
///
/// Carries the handle in the state it had before the transition together with the
/// cause, so the bus and delay are never lost to a transient error.
///
/// # Examples
///
/// ```rust,no_run
/// # #[cfg(not(feature = "async"))]
/// # fn main() {
/// use vl53l3cx_hist::VL53L3cx;
///
/// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
/// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
/// let sensor = VL53L3cx::new(i2c, delay).init().unwrap().start().unwrap();
///
/// let sensor = match sensor.stop() {
///     Ok(sensor) => sensor,
///     // Still ranging; one more attempt
///     Err(failed) => failed.into_sensor().stop().unwrap(),
/// };
/// # }
/// # #[cfg(feature = "async")]
/// # fn main() {}
/// ```
pub struct TransitionError<I2C, D, S, E: core::fmt::Debug> {
    sensor: VL53L3cx<I2C, D, S>,
    error: Error<E>,
}

impl<I2C, D, S, E: core::fmt::Debug> TransitionError<I2C, D, S, E> {
    fn new(sensor: VL53L3cx<I2C, D, S>, error: Error<E>) -> Self {
        Self { sensor, error }
    }

    /// Cause of the failure.
    pub fn error(&self) -> &Error<E> {
        &self.error
    }

    /// Handle in its state before the failed transition.
    pub fn into_sensor(self) -> VL53L3cx<I2C, D, S> {
        self.sensor
    }

    /// Drops the handle and keeps the cause.
    pub fn into_error(self) -> Error<E> {
        self.error
    }

    /// Handle and cause.
    pub fn into_parts(self) -> (VL53L3cx<I2C, D, S>, Error<E>) {
        (self.sensor, self.error)
    }

    /// Rewinds the handle to [`PoweredOn`] for a failed bring-up step.
    fn into_powered_on(self) -> TransitionError<I2C, D, PoweredOn, E> {
        TransitionError::new(self.sensor.into_state(PoweredOn), self.error)
    }
}

impl<I2C, D, S, E: core::fmt::Debug> core::fmt::Debug for TransitionError<I2C, D, S, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransitionError")
            .field("state", &core::any::type_name::<S>())
            .field("error", &self.error)
            .finish()
    }
}

impl<I2C, D, S, E: core::fmt::Debug> core::fmt::Display for TransitionError<I2C, D, S, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}
