//! Configuration loader.
//!
//! The static, general and timing groups are plain register writes. The dynamic group
//! is written under the grouped parameter hold so the device picks it up atomically at
//! the start of the next measurement, also while ranging is active.

use crate::preset::{self, GROUPED_HOLD_APPLY, GROUPED_HOLD_OPEN};
use crate::register::{Register, Setting};
use crate::{
    Calibrated, CalibratedState, Configured, DelayNs, Error, I2c, InterruptOn, Ranging,
    TransitionError, VL53L3cx,
};

/// Smallest and largest ROI edge in SPADs.
const ROI_EDGE: core::ops::RangeInclusive<u8> = 4..=16;

/// States in which the preset is loaded and the dynamic group may be rewritten.
pub trait PresetLoaded: CalibratedState {}

impl PresetLoaded for Configured {}
impl PresetLoaded for Ranging {}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, Calibrated>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Loads the medium range preset.
    ///
    /// Writes the static, general and timing groups in that order, then the dynamic
    /// group framed by the grouped parameter hold. The first I2C error aborts the
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns the `Calibrated` handle inside the [`TransitionError`]; a retry writes
    /// the whole preset again:
    ///
    /// * `Error::I2cError(E)` - If there was an I2C communication error
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
    /// let sensor = VL53L3cx::new(i2c, delay)
    ///     .wait_boot(500)
    ///     .unwrap()
    ///     .read_calibration()
    ///     .unwrap();
    ///
    /// let mut sensor = sensor.load_preset().unwrap();
    /// sensor.verify_preset().unwrap();
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn load_preset(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, Configured>, TransitionError<I2C, D, Calibrated, E>> {
        info!("Loading medium range preset");
        if let Err(error) = self.write_preset().await {
            return Err(TransitionError::new(self, error));
        }
        let calibration = self.state.0;
        Ok(self.into_state(Configured(calibration)))
    }

    async fn write_preset(&mut self) -> Result<(), Error<E>> {
        for setting in preset::STATIC
            .iter()
            .chain(preset::GENERAL.iter())
            .chain(preset::TIMING.iter())
        {
            self.write_setting(setting).await?;
        }
        self.write_dynamic(&preset::DYNAMIC_FIRST, &preset::DYNAMIC_SECOND)
            .await
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, Configured>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Sets the inter-measurement period of the timing group.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If `period_ms` is zero
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn set_inter_measurement_ms(&mut self, period_ms: u32) -> Result<(), Error<E>> {
        if period_ms == 0 {
            error!("Invalid inter-measurement period: {}", period_ms);
            return Err(Error::InvalidArgument);
        }
        self.write_dword(Register::SystemIntermeasurementPeriod, period_ms)
            .await
    }

    /// Reads back every preset register and compares it with the preset value.
    ///
    /// Only meaningful before the dynamic group or the timing group was changed.
    ///
    /// # Errors
    ///
    /// * `Err(Error::PresetMismatch { .. })` - On the first register that differs
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn verify_preset(&mut self) -> Result<(), Error<E>> {
        for setting in preset::all_settings() {
            let actual = self.read_register(setting.register, setting.width).await?;
            if actual != setting.value {
                let register = u16::from(setting.register);
                error!(
                    "Preset mismatch at {:#x}: wrote {:#x}, read {:#x}",
                    register,
                    setting.value,
                    actual
                );
                return Err(Error::PresetMismatch {
                    register,
                    expected: setting.value,
                    actual,
                });
            }
        }
        debug!("Preset verified");
        Ok(())
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D, S> VL53L3cx<I2C, D, S>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
    S: PresetLoaded,
{
    /// Sets the region of interest.
    ///
    /// Takes effect at the next measurement when ranging is active.
    ///
    /// # Arguments
    ///
    /// * `width` - ROI width in SPADs (4-16)
    /// * `height` - ROI height in SPADs (4-16)
    /// * `centre_spad` - SPAD number of the ROI centre, 199 is the optical centre
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If width or height is outside 4-16
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
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
    /// let mut sensor = VL53L3cx::new(i2c, delay).init().unwrap();
    ///
    /// // Narrow 8x8 field of view around the optical centre
    /// sensor.set_roi(8, 8, 199).unwrap();
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn set_roi(
        &mut self,
        width: u8,
        height: u8,
        centre_spad: u8,
    ) -> Result<(), Error<E>> {
        if !ROI_EDGE.contains(&width) || !ROI_EDGE.contains(&height) {
            error!("Invalid ROI size: {}x{}", width, height);
            return Err(Error::InvalidArgument);
        }
        let xy_size = ((height - 1) << 4) | (width - 1);
        self.write_dynamic(
            &[],
            &[
                Setting::byte(Register::RoiConfigUserRoiCentreSpad, centre_spad),
                Setting::byte(Register::RoiConfigUserRoiRequestedGlobalXySize, xy_size),
            ],
        )
        .await
    }

    /// Sets the interrupt source and the distance thresholds.
    ///
    /// The thresholds go through the grouped parameter hold. [`start`](VL53L3cx::start)
    /// selects the new sample source again, so a different source set while
    /// `Configured` only lasts until ranging starts.
    ///
    /// # Arguments
    ///
    /// * `low_threshold_mm` - Lower distance threshold in millimeters
    /// * `high_threshold_mm` - Upper distance threshold in millimeters
    /// * `interrupt_on` - Interrupt trigger condition
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If the low threshold exceeds the high one
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn set_interrupt_configuration(
        &mut self,
        low_threshold_mm: u16,
        high_threshold_mm: u16,
        interrupt_on: InterruptOn,
    ) -> Result<(), Error<E>> {
        if low_threshold_mm > high_threshold_mm {
            error!(
                "Invalid thresholds: low {} > high {}",
                low_threshold_mm,
                high_threshold_mm
            );
            return Err(Error::InvalidArgument);
        }
        self.write_byte(Register::SystemInterruptConfigGpio, interrupt_on.into())
            .await?;
        self.write_dynamic(
            &[
                Setting::word(Register::SystemThreshHigh, high_threshold_mm),
                Setting::word(Register::SystemThreshLow, low_threshold_mm),
            ],
            &[],
        )
        .await
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D, S> VL53L3cx<I2C, D, S>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Writes both dynamic batches under the grouped parameter hold.
    async fn write_dynamic(
        &mut self,
        first: &[Setting],
        second: &[Setting],
    ) -> Result<(), Error<E>> {
        trace!("Grouped hold: {} + {} settings", first.len(), second.len());
        self.write_byte(Register::SystemGroupedParameterHold0, GROUPED_HOLD_OPEN)
            .await?;
        for setting in first {
            self.write_setting(setting).await?;
        }
        self.write_byte(Register::SystemGroupedParameterHold1, GROUPED_HOLD_OPEN)
            .await?;
        for setting in second {
            self.write_setting(setting).await?;
        }
        self.write_byte(Register::SystemGroupedParameterHold, GROUPED_HOLD_APPLY)
            .await
    }
}
