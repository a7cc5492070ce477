//! Boot and bring-up.

use crate::register::Register;
use crate::{
    Booted, Calibrated, Configured, DelayNs, Error, I2c, PoweredOn, TransitionError, VL53L3cx,
};

/// Bit 0 of `FIRMWARE__SYSTEM_STATUS`: firmware boot complete.
const BOOT_STATE: u8 = 0x01;
/// Bit 0 of `PAD_I2C_HV__EXTSUP_CONFIG`: I2C pads at 2V8.
const PAD_2V8: u8 = 0x01;
/// Valid 7-bit addresses; the rest are reserved by the I2C specification.
const ADDRESS_RANGE: core::ops::RangeInclusive<u8> = 0x08..=0x77;

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, PoweredOn>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Waits for the firmware boot flag.
    ///
    /// The flag is polled immediately and then once per millisecond. The timeout
    /// counts requested delay, so it is never reported before `timeout_ms` elapsed.
    ///
    /// # Arguments
    ///
    /// * `timeout_ms` - Upper bound for the wait, 500 ms is a good reference
    ///
    /// # Errors
    ///
    /// Returns the handle unchanged inside the [`TransitionError`] on failure:
    ///
    /// * `Error::BootTimeout` - If the flag did not rise in time
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
    /// let sensor = VL53L3cx::new(i2c, delay);
    ///
    /// let mut sensor = sensor.wait_boot(500).unwrap();
    /// println!("Model id: {:#06x}", sensor.sensor_id().unwrap());
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn wait_boot(
        mut self,
        timeout_ms: u32,
    ) -> Result<VL53L3cx<I2C, D, Booted>, TransitionError<I2C, D, PoweredOn, E>> {
        info!("Waiting for sensor to boot");
        if let Err(error) = self.poll_boot(timeout_ms).await {
            return Err(TransitionError::new(self, error));
        }
        Ok(self.into_state(Booted))
    }

    /// Runs the complete bring-up using the driver's [`Config`](crate::Config).
    ///
    /// Waits for boot, switches the pads to 2V8 when configured, reads the calibration
    /// from NVM and loads the medium range preset.
    ///
    /// # Errors
    ///
    /// Any error of [`wait_boot`](Self::wait_boot),
    /// [`configure_io_voltage`](VL53L3cx::configure_io_voltage),
    /// [`read_calibration`](VL53L3cx::read_calibration) or
    /// [`load_preset`](VL53L3cx::load_preset). The handle comes back in `PoweredOn`
    /// whichever step failed, ready for another `init` after a reset.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # #[cfg(not(feature = "async"))]
    /// # fn main() {
    /// use vl53l3cx_hist::{Config, VL53L3cx};
    ///
    /// let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
    /// let delay = embedded_hal_mock::eh1::delay::NoopDelay;
    /// let config = Config { io_2v8: true, ..Config::default() };
    ///
    /// let sensor = VL53L3cx::with_config(i2c, delay, config).init().unwrap();
    /// println!("Oscillator: {:#06x}", sensor.calibration().fast_osc_frequency);
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn init(
        self,
    ) -> Result<VL53L3cx<I2C, D, Configured>, TransitionError<I2C, D, PoweredOn, E>> {
        let boot_timeout_ms = self.config.boot_timeout_ms;
        let mut sensor = self.wait_boot(boot_timeout_ms).await?;
        if sensor.config.io_2v8 {
            if let Err(error) = sensor.configure_io_voltage(true).await {
                return Err(TransitionError::new(sensor.into_state(PoweredOn), error));
            }
        }
        let sensor: VL53L3cx<I2C, D, Calibrated> = sensor
            .read_calibration()
            .await
            .map_err(TransitionError::into_powered_on)?;
        sensor
            .load_preset()
            .await
            .map_err(TransitionError::into_powered_on)
    }

    async fn poll_boot(&mut self, timeout_ms: u32) -> Result<(), Error<E>> {
        let mut elapsed_ms = 0u32;
        loop {
            let status = self.read_byte(Register::FirmwareSystemStatus).await?;
            if status & BOOT_STATE != 0 {
                debug!("Booted after {} ms", elapsed_ms);
                break Ok(());
            }
            if elapsed_ms >= timeout_ms {
                error!("Boot flag not set after {} ms", elapsed_ms);
                break Err(Error::BootTimeout);
            }
            self.delay.delay_ms(1).await;
            elapsed_ms += 1;
        }
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, Booted>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Selects the I2C pad voltage.
    ///
    /// `true` sets the 2V8 bit and leaves every other bit of the register untouched.
    /// `false` is the power-on level and performs no bus access.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn configure_io_voltage(&mut self, is_2v8: bool) -> Result<(), Error<E>> {
        if !is_2v8 {
            return Ok(());
        }
        debug!("Switching I2C pads to 2V8");
        self.modify_byte(Register::PadI2cHvExtsupConfig, PAD_2V8, PAD_2V8)
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
    /// Reads the 16-bit model identification register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn sensor_id(&mut self) -> Result<u16, Error<E>> {
        self.read_word(Register::IdentificationModelId).await
    }

    /// Moves the sensor to a new 7-bit bus address.
    ///
    /// The write goes to the current address; every later transaction uses the new
    /// one. The change is volatile and lost on power cycle or XSHUT reset.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidAddress(u8))` - If `new_address` is outside `0x08..=0x77`;
    ///   the bus is not touched
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
    /// let mut sensor = VL53L3cx::new(i2c, delay).wait_boot(500).unwrap();
    ///
    /// sensor.set_address(0x30).unwrap();
    /// assert_eq!(sensor.address(), 0x30);
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn set_address(&mut self, new_address: u8) -> Result<(), Error<E>> {
        if !ADDRESS_RANGE.contains(&new_address) {
            error!("Invalid I2C address: {:#x}", new_address);
            return Err(Error::InvalidAddress(new_address));
        }
        self.write_byte(Register::I2cSlaveDeviceAddress, new_address)
            .await?;
        info!("I2C address changed {:#x} -> {:#x}", self.address, new_address);
        self.address = new_address;
        Ok(())
    }
}
