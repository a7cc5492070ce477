//! Driver configuration.

use crate::histogram::BinWidthPolicy;

/// Default bound for the boot poll, in milliseconds.
pub const DEFAULT_BOOT_TIMEOUT_MS: u32 = 500;

/// Default bound for the data ready poll, in milliseconds.
///
/// A measurement nominally completes in ~33 ms; the margin tolerates a missed cycle.
pub const DEFAULT_DATA_READY_TIMEOUT_MS: u32 = 2000;

/// Default minimum corrected peak count for sub-bin refinement.
pub const DEFAULT_MIN_PEAK_COUNT: u32 = 16;

/// Distance estimator policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EstimatorConfig {
    /// How histogram bin widths are derived
    pub bin_width: BinWidthPolicy,
    /// Sub-bin refinement only runs when the corrected peak count exceeds this
    pub min_peak_count: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            bin_width: BinWidthPolicy::Nominal,
            min_peak_count: DEFAULT_MIN_PEAK_COUNT,
        }
    }
}

/// Bring-up and ranging configuration.
///
/// # Examples
///
/// ```rust
/// use vl53l3cx_hist::{BinWidthPolicy, Config};
///
/// let config = Config {
///     io_2v8: true,
///     ..Config::default()
/// };
/// assert_eq!(config.boot_timeout_ms, 500);
/// assert_eq!(config.estimator.bin_width, BinWidthPolicy::Nominal);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bound for [`wait_boot`](crate::VL53L3cx::wait_boot) during `init`
    pub boot_timeout_ms: u32,
    /// Bound for the data ready poll in `next_measurement`
    pub data_ready_timeout_ms: u32,
    /// Switch the I2C pads to 2V8 during `init`
    pub io_2v8: bool,
    /// Distance estimator policy
    pub estimator: EstimatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot_timeout_ms: DEFAULT_BOOT_TIMEOUT_MS,
            data_ready_timeout_ms: DEFAULT_DATA_READY_TIMEOUT_MS,
            io_2v8: false,
            estimator: EstimatorConfig::default(),
        }
    }
}
