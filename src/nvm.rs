//! NVM calibration readout.
//!
//! The NVM is only readable while its power and clock are forced on. The enabled
//! window is the [`NvmEnabled`] state, so [`read_nvm`](VL53L3cx::read_nvm) cannot be
//! called outside it.

use crate::register::Register;
use crate::{Booted, Calibrated, DelayNs, Error, I2c, NvmEnabled, TransitionError, VL53L3cx};

/// Settle time after forcing the GO1 power domain on.
const POWER_FORCE_SETTLE_US: u32 = 250;
/// Settle time after enabling the ranging core clock.
const CLOCK_SETTLE_MS: u32 = 5;
/// Width of the read strobe.
const READ_STROBE_US: u32 = 5;
/// NVM read pulse width.
const NVM_PULSE_WIDTH: u16 = 0x0004;

/// Interpreted NVM words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmField {
    /// Fast oscillator frequency, low 16 bits, 4.12 fixed point MHz
    FastOscFrequency,
    /// Factory default I2C address, low 7 bits
    DefaultI2cAddress,
    /// VHV timeout loop bound, low byte
    VhvTimeoutBound,
}

impl NvmField {
    /// NVM word address holding the field.
    #[must_use]
    pub const fn address(self) -> u8 {
        match self {
            NvmField::FastOscFrequency => 0x1C,
            NvmField::DefaultI2cAddress => 0x11,
            NvmField::VhvTimeoutBound => 0x13,
        }
    }

    /// Extracts the field from its NVM word.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn extract(self, word: u32) -> u16 {
        match self {
            NvmField::FastOscFrequency => (word & 0xFFFF) as u16,
            NvmField::DefaultI2cAddress => (word & 0x7F) as u16,
            NvmField::VhvTimeoutBound => (word & 0xFF) as u16,
        }
    }
}

/// Factory calibration, read once during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Fast oscillator frequency, 4.12 fixed point MHz
    pub fast_osc_frequency: u16,
    /// Factory default 7-bit I2C address
    pub default_address: u8,
    /// VHV timeout loop bound
    pub vhv_timeout_bound: u8,
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
    /// Opens the NVM read window.
    ///
    /// A partial power up is undone before reporting, so the firmware gets its clock
    /// back whichever step failed.
    ///
    /// # Errors
    ///
    /// Returns the `Booted` handle inside the [`TransitionError`]:
    ///
    /// * `Error::NvmReadFailure(E)` - If a power up step failed
    pub async fn enable_nvm(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, NvmEnabled>, TransitionError<I2C, D, Booted, E>> {
        if let Err(error) = self.nvm_power_up().await {
            error!("NVM power up failed");
            // Best effort, the power up error wins
            let _ = self.nvm_power_down().await;
            return Err(TransitionError::new(self, error.into_nvm()));
        }
        Ok(self.into_state(NvmEnabled))
    }

    /// Reads the factory calibration.
    ///
    /// Opens the NVM window, reads every [`NvmField`] and closes the window again.
    /// The close sequence runs even when a read failed.
    ///
    /// # Errors
    ///
    /// Returns the `Booted` handle inside the [`TransitionError`]:
    ///
    /// * `Error::NvmReadFailure(E)` - If opening the window or a read failed
    /// * `Error::I2cError(E)` - If only closing the window failed
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
    /// let sensor = VL53L3cx::new(i2c, delay).wait_boot(500).unwrap();
    ///
    /// let sensor = sensor.read_calibration().unwrap();
    /// println!("{:?}", sensor.calibration());
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn read_calibration(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, Calibrated>, TransitionError<I2C, D, Booted, E>> {
        info!("Reading calibration from NVM");
        let read = self.read_calibration_words().await;
        let closed = self.nvm_power_down().await;
        let calibration = match (read, closed) {
            (Err(error), _) => return Err(TransitionError::new(self, error.into_nvm())),
            (Ok(_), Err(error)) => return Err(TransitionError::new(self, error)),
            (Ok(calibration), Ok(())) => calibration,
        };

        if calibration.fast_osc_frequency == 0 {
            warn!("NVM oscillator frequency is zero, using nominal bin widths");
        }
        debug!(
            "Calibration: osc {:#x} address {:#x} vhv {}",
            calibration.fast_osc_frequency,
            calibration.default_address,
            calibration.vhv_timeout_bound
        );
        Ok(self.into_state(Calibrated(calibration)))
    }

    async fn read_calibration_words(&mut self) -> Result<Calibration, Error<E>> {
        self.nvm_power_up().await?;
        let fast_osc_frequency = self.read_field(NvmField::FastOscFrequency).await?;
        let default_address = self.read_field(NvmField::DefaultI2cAddress).await?;
        let vhv_timeout_bound = self.read_field(NvmField::VhvTimeoutBound).await?;
        #[allow(clippy::cast_possible_truncation)]
        let calibration = Calibration {
            fast_osc_frequency,
            default_address: default_address as u8,
            vhv_timeout_bound: vhv_timeout_bound as u8,
        };
        Ok(calibration)
    }

    async fn read_field(&mut self, field: NvmField) -> Result<u16, Error<E>> {
        let word = self.nvm_word(field.address()).await?;
        Ok(field.extract(word))
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, NvmEnabled>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Reads one 32-bit NVM word.
    ///
    /// # Errors
    ///
    /// * `Err(Error::NvmReadFailure(E))` - If the address write, strobe or data read
    ///   failed
    pub async fn read_nvm(&mut self, nvm_address: u8) -> Result<u32, Error<E>> {
        self.nvm_word(nvm_address).await.map_err(Error::into_nvm)
    }

    /// Closes the NVM read window and hands the firmware its clock back.
    ///
    /// Every step is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the `NvmEnabled` handle inside the [`TransitionError`], so the close can
    /// be retried:
    ///
    /// * `Error::I2cError(E)` - The first I2C error seen
    pub async fn disable_nvm(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, Booted>, TransitionError<I2C, D, NvmEnabled, E>> {
        if let Err(error) = self.nvm_power_down().await {
            return Err(TransitionError::new(self, error));
        }
        Ok(self.into_state(Booted))
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
    async fn nvm_power_up(&mut self) -> Result<(), Error<E>> {
        trace!("NVM power up");
        self.write_byte(Register::FirmwareEnable, 0x00).await?;
        self.write_byte(Register::PowerManagementGo1PowerForce, 0x01)
            .await?;
        self.delay.delay_us(POWER_FORCE_SETTLE_US).await;
        self.write_byte(Register::RangingCoreNvmCtrlPdn, 0x01).await?;
        self.write_byte(Register::RangingCoreClkCtrl1, 0x05).await?;
        self.delay.delay_ms(CLOCK_SETTLE_MS).await;
        self.write_byte(Register::RangingCoreNvmCtrlMode, 0x01).await?;
        self.write_word(Register::RangingCoreNvmCtrlPulseWidthMsb, NVM_PULSE_WIDTH)
            .await
    }

    async fn nvm_word(&mut self, nvm_address: u8) -> Result<u32, Error<E>> {
        self.write_byte(Register::RangingCoreNvmCtrlAddr, nvm_address)
            .await?;
        self.write_byte(Register::RangingCoreNvmCtrlReadn, 0x00).await?;
        self.delay.delay_us(READ_STROBE_US).await;
        self.write_byte(Register::RangingCoreNvmCtrlReadn, 0x01).await?;
        let word = self.read_dword(Register::RangingCoreNvmCtrlDataoutMmm).await?;
        trace!("NVM[{:#x}] = {:#x}", nvm_address, word);
        Ok(word)
    }

    async fn nvm_power_down(&mut self) -> Result<(), Error<E>> {
        trace!("NVM power down");
        let steps = [
            (Register::RangingCoreClkCtrl1, 0x01),
            (Register::RangingCoreNvmCtrlPdn, 0x00),
            (Register::PowerManagementGo1PowerForce, 0x00),
            (Register::FirmwareEnable, 0x01),
        ];
        let mut first_error = None;
        for (register, value) in steps {
            if let Err(e) = self.write_byte(register, value).await {
                warn!("NVM power down step {:#x} failed", u16::from(register));
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(all(test, not(feature = "async")))]
mod tests {
    use super::*;
    use crate::testing::{
        nvm_power_down, nvm_power_up, nvm_word, read, write, RecordingDelay, ADDR,
    };
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    fn booted_mock(expectations: &[Transaction]) -> I2cMock {
        let mut all = vec![read(0x00E5, &[0x01])];
        all.extend_from_slice(expectations);
        I2cMock::new(&all)
    }

    fn booted(i2c: I2cMock) -> VL53L3cx<I2cMock, RecordingDelay, Booted> {
        VL53L3cx::new(i2c, RecordingDelay::default())
            .wait_boot(500)
            .unwrap()
    }

    #[test]
    fn fields_are_masked_out_of_their_words() {
        assert_eq!(NvmField::FastOscFrequency.extract(0xDEAD_BCCC), 0xBCCC);
        assert_eq!(NvmField::DefaultI2cAddress.extract(0x0000_00A9), 0x29);
        assert_eq!(NvmField::VhvTimeoutBound.extract(0x1234_5609), 0x09);
    }

    #[test]
    fn read_nvm_assembles_big_endian_word_with_strobe() {
        let mut expectations = nvm_power_up();
        expectations.extend(nvm_word(0x1C, [0x12, 0x34, 0x56, 0x78]));
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let mut sensor = booted(i2c).enable_nvm().unwrap();
        assert_eq!(sensor.read_nvm(0x1C).unwrap(), 0x1234_5678);
        let sensor = sensor.disable_nvm().unwrap();

        let (_, delay) = sensor.release();
        assert_eq!(delay.waits_ns, vec![250_000, 5_000_000, 5_000]);

        done.done();
    }

    #[test]
    fn read_nvm_reports_bus_errors_as_nvm_failures() {
        let mut expectations = nvm_power_up();
        expectations.extend([
            write(0x0684, &[0x1C]),
            write(0x0685, &[0x00]),
            write(0x0685, &[0x01]),
            Transaction::write_read(ADDR, vec![0x06, 0x86], vec![0; 4])
                .with_error(ErrorKind::Other),
        ]);
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let mut sensor = booted(i2c).enable_nvm().unwrap();
        let result = sensor.read_nvm(0x1C);
        assert!(matches!(result, Err(Error::NvmReadFailure(ErrorKind::Other))));
        sensor.disable_nvm().unwrap();

        done.done();
    }

    #[test]
    fn failed_enable_powers_the_window_down_again() {
        let mut expectations = vec![
            write(0x0085, &[0x00]),
            write(0x0083, &[0x01]),
            Transaction::write(ADDR, vec![0x06, 0x80, 0x01]).with_error(ErrorKind::Other),
        ];
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let Err(failed) = booted(i2c).enable_nvm() else {
            panic!("enable succeeded on a failing bus");
        };
        assert!(matches!(
            failed.error(),
            Error::NvmReadFailure(ErrorKind::Other)
        ));
        let (_, delay) = failed.into_sensor().release();
        assert_eq!(delay.waits_ns, vec![250_000]);

        done.done();
    }

    #[test]
    fn read_calibration_runs_the_full_sequence() {
        let mut expectations = nvm_power_up();
        expectations.extend(nvm_word(0x1C, [0x00, 0x00, 0xBC, 0xCC]));
        expectations.extend(nvm_word(0x11, [0x00, 0x00, 0x00, 0x29]));
        expectations.extend(nvm_word(0x13, [0x00, 0x00, 0x00, 0x09]));
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let sensor = booted(i2c).read_calibration().unwrap();
        assert_eq!(
            *sensor.calibration(),
            Calibration {
                fast_osc_frequency: 0xBCCC,
                default_address: 0x29,
                vhv_timeout_bound: 0x09,
            }
        );
        let (_, delay) = sensor.release();
        assert_eq!(
            delay.waits_ns,
            vec![250_000, 5_000_000, 5_000, 5_000, 5_000]
        );

        done.done();
    }

    #[test]
    fn failed_read_still_closes_the_window() {
        let mut expectations = nvm_power_up();
        expectations.extend([
            write(0x0684, &[0x1C]),
            write(0x0685, &[0x00]),
            write(0x0685, &[0x01]),
            Transaction::write_read(ADDR, vec![0x06, 0x86], vec![0; 4])
                .with_error(ErrorKind::Other),
        ]);
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let result = booted(i2c)
            .read_calibration()
            .map_err(TransitionError::into_error);
        assert!(matches!(result, Err(Error::NvmReadFailure(ErrorKind::Other))));

        done.done();
    }

    #[test]
    fn disable_attempts_every_step_and_reports_the_first_error() {
        let mut expectations = nvm_power_up();
        expectations.extend([
            Transaction::write(ADDR, vec![0x06, 0x83, 0x01]).with_error(ErrorKind::Other),
            write(0x0680, &[0x00]),
            Transaction::write(ADDR, vec![0x00, 0x83, 0x00])
                .with_error(ErrorKind::Bus),
            write(0x0085, &[0x01]),
        ]);
        expectations.extend(nvm_power_down());
        let i2c = booted_mock(&expectations);
        let mut done = i2c.clone();

        let sensor = booted(i2c).enable_nvm().unwrap();
        let Err(failed) = sensor.disable_nvm() else {
            panic!("disable succeeded on a failing bus");
        };
        let (sensor, error) = failed.into_parts();
        assert!(matches!(error, Error::I2cError(ErrorKind::Other)));
        // The handle is still in the window and the close can be repeated
        sensor.disable_nvm().unwrap();

        done.done();
    }
}
