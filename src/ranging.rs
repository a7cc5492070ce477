//! Continuous histogram ranging.

use crate::histogram::{
    self, BinWidths, DistanceEstimate, HistogramResult, RESULT_BLOCK_LEN,
};
use crate::preset;
use crate::register::Register;
use crate::{Configured, DelayNs, Error, I2c, Ranging, TransitionError, VL53L3cx};

/// Back-to-back timed ranging (0x40) with the histogram scheduler (0x02).
const MODE_START_BACK_TO_BACK_HISTOGRAM: u8 = 0x42;
/// Abort the running measurement sequence.
const MODE_ABORT: u8 = 0x80;
/// Clears the range interrupt.
const INTERRUPT_CLEAR_RANGE: u8 = 0x01;
/// Bit 0 of `GPIO__TIO_HV_STATUS`: interrupt line level.
const TIO_HV_STATUS_LEVEL: u8 = 0x01;

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
    /// Starts continuous back-to-back histogram ranging.
    ///
    /// Selects the new sample interrupt source, clears any pending interrupt and
    /// starts the measurement sequence.
    ///
    /// # Errors
    ///
    /// Returns the `Configured` handle inside the [`TransitionError`]:
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
    /// let sensor = VL53L3cx::new(i2c, delay).init().unwrap();
    ///
    /// let mut sensor = sensor.start().unwrap();
    /// sensor.poll_ready(100).unwrap();
    /// let (histogram, estimate) = sensor.read_result().unwrap();
    /// println!("stream {} distance {:?}", histogram.stream_count, estimate.distance());
    /// # }
    /// # #[cfg(feature = "async")]
    /// # fn main() {}
    /// ```
    pub async fn start(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, Ranging>, TransitionError<I2C, D, Configured, E>> {
        info!("Starting histogram ranging");
        if let Err(error) = self.start_sequence().await {
            return Err(TransitionError::new(self, error));
        }
        let calibration = self.state.0;
        Ok(self.into_state(Ranging(calibration)))
    }

    async fn start_sequence(&mut self) -> Result<(), Error<E>> {
        self.write_byte(
            Register::SystemInterruptConfigGpio,
            preset::INTERRUPT_ON_NEW_SAMPLE,
        )
        .await?;
        self.clear_interrupt().await?;
        self.write_byte(Register::SystemModeStart, MODE_START_BACK_TO_BACK_HISTOGRAM)
            .await
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<I2C, E, D> VL53L3cx<I2C, D, Ranging>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Checks whether a new result is available.
    ///
    /// Only reads the interrupt line state; it does not clear the interrupt.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn is_data_ready(&mut self) -> Result<bool, Error<E>> {
        let status = self.read_byte(Register::GpioTioHvStatus).await?;
        let level = status & TIO_HV_STATUS_LEVEL != 0;
        Ok(level == preset::data_ready_active_high())
    }

    /// Polls for a new result once per millisecond.
    ///
    /// The first check happens without waiting. The timeout counts requested delay,
    /// so it is never reported before `timeout_ms` elapsed.
    ///
    /// # Errors
    ///
    /// * `Err(Error::MeasurementTimeout)` - If no result arrived in time
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn poll_ready(&mut self, timeout_ms: u32) -> Result<(), Error<E>> {
        let mut elapsed_ms = 0u32;
        loop {
            if self.is_data_ready().await? {
                trace!("Data ready after {} ms", elapsed_ms);
                break Ok(());
            }
            if elapsed_ms >= timeout_ms {
                warn!("No data ready after {} ms", elapsed_ms);
                break Err(Error::MeasurementTimeout);
            }
            self.delay.delay_ms(1).await;
            elapsed_ms += 1;
        }
    }

    /// Reads the result block, estimates the distance and clears the interrupt.
    ///
    /// The estimate is returned whatever the range status;
    /// [`DistanceEstimate::is_valid`] tells whether it can be trusted.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_result(&mut self) -> Result<(HistogramResult, DistanceEstimate), Error<E>> {
        let mut block = [0u8; RESULT_BLOCK_LEN];
        self.read_block(Register::ResultInterruptStatus, &mut block)
            .await?;
        let result = HistogramResult::parse(&block);

        let widths = BinWidths::for_policy(
            self.config.estimator.bin_width,
            self.state.0.fast_osc_frequency,
        );
        let estimate = histogram::estimate(&result, &widths, self.config.estimator.min_peak_count);

        self.clear_interrupt().await?;
        Ok((result, estimate))
    }

    /// Waits for the next result and returns its estimate if the range is valid.
    ///
    /// # Errors
    ///
    /// * `Err(Error::MeasurementTimeout)` - If no result arrived within the configured
    ///   data ready timeout
    /// * `Err(Error::RangeStatusError(u8))` - If the device flagged the range; carries
    ///   the raw status byte
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn next_measurement(&mut self) -> Result<DistanceEstimate, Error<E>> {
        self.poll_ready(self.config.data_ready_timeout_ms).await?;
        let (_, estimate) = self.read_result().await?;
        estimate.check::<E>()?;
        Ok(estimate)
    }

    /// Stops ranging. The preset stays loaded, so [`start`](VL53L3cx::start) may be
    /// called again.
    ///
    /// # Errors
    ///
    /// Returns the `Ranging` handle inside the [`TransitionError`]; the device may
    /// still be ranging and `stop` can be called on it again:
    ///
    /// * `Error::I2cError(E)` - If there was an I2C communication error
    pub async fn stop(
        mut self,
    ) -> Result<VL53L3cx<I2C, D, Configured>, TransitionError<I2C, D, Ranging, E>> {
        info!("Stopping histogram ranging");
        if let Err(error) = self.stop_sequence().await {
            return Err(TransitionError::new(self, error));
        }
        let calibration = self.state.0;
        Ok(self.into_state(Configured(calibration)))
    }

    async fn stop_sequence(&mut self) -> Result<(), Error<E>> {
        // A single abort can be missed while the scheduler is between phases
        self.write_byte(Register::SystemModeStart, MODE_ABORT).await?;
        self.write_byte(Register::SystemModeStart, MODE_ABORT).await?;
        self.clear_interrupt().await
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
    /// Clears the range interrupt so the next result can raise it again.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn clear_interrupt(&mut self) -> Result<(), Error<E>> {
        self.write_byte(Register::SystemInterruptClear, INTERRUPT_CLEAR_RANGE)
            .await
    }
}

#[cfg(all(test, not(feature = "async")))]
mod tests {
    use crate::histogram::{HISTOGRAM_BINS, RESULT_BLOCK_LEN};
    use crate::testing::{read, sensor_in, write, ADDR, CALIBRATION};
    use crate::{BinWidthPolicy, Calibration, Configured, Error, RangeStatus, Ranging};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    fn block(range_status: u8, bins: [u32; HISTOGRAM_BINS]) -> Vec<u8> {
        let mut block = vec![0x01, range_status, 0x00, 0x07, 0x00];
        for bin in bins {
            block.extend_from_slice(&bin.to_be_bytes()[1..]);
        }
        assert_eq!(block.len(), RESULT_BLOCK_LEN);
        block
    }

    fn peak_at_eight() -> [u32; HISTOGRAM_BINS] {
        let mut bins = [0u32; HISTOGRAM_BINS];
        bins[6] = 50;
        bins[7] = 80;
        bins[8] = 300;
        bins[9] = 90;
        bins[10] = 40;
        bins
    }

    fn result_read(range_status: u8, bins: [u32; HISTOGRAM_BINS]) -> Vec<Transaction> {
        vec![read(0x0088, &block(range_status, bins)), write(0x0086, &[0x01])]
    }

    #[test]
    fn start_arms_interrupt_and_starts_histogram_mode() {
        let expectations = [
            write(0x0046, &[0x20]),
            write(0x0086, &[0x01]),
            write(0x0087, &[0x42]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();

        let sensor = sensor_in(i2c, Configured(CALIBRATION)).start().unwrap();
        let (_, delay) = sensor.release();
        assert!(delay.waits_ns.is_empty());

        done.done();
    }

    #[test]
    fn stop_aborts_twice_then_clears() {
        let expectations = [
            write(0x0087, &[0x80]),
            write(0x0087, &[0x80]),
            write(0x0086, &[0x01]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();

        let sensor = sensor_in(i2c, Ranging(CALIBRATION)).stop().unwrap();
        assert_eq!(*sensor.calibration(), CALIBRATION);

        done.done();
    }

    #[test]
    fn failed_stop_keeps_ranging_and_can_be_repeated() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x87, 0x80]).with_error(ErrorKind::Other),
            write(0x0087, &[0x80]),
            write(0x0087, &[0x80]),
            write(0x0086, &[0x01]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();

        let Err(failed) = sensor_in(i2c, Ranging(CALIBRATION)).stop() else {
            panic!("abort write failed");
        };
        assert!(matches!(failed.error(), Error::I2cError(ErrorKind::Other)));
        let sensor = failed.into_sensor().stop().unwrap();
        assert_eq!(*sensor.calibration(), CALIBRATION);

        done.done();
    }

    #[test]
    fn failed_start_returns_the_configured_sensor() {
        let expectations = [
            write(0x0046, &[0x20]),
            Transaction::write(ADDR, vec![0x00, 0x86, 0x01]).with_error(ErrorKind::Other),
            write(0x0046, &[0x20]),
            write(0x0086, &[0x01]),
            write(0x0087, &[0x42]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();

        let Err(failed) = sensor_in(i2c, Configured(CALIBRATION)).start() else {
            panic!("interrupt clear failed");
        };
        let (sensor, error) = failed.into_parts();
        assert!(matches!(error, Error::I2cError(ErrorKind::Other)));
        sensor.start().unwrap();

        done.done();
    }

    #[test]
    fn data_ready_is_active_high_on_bit_zero() {
        let expectations = [
            read(0x0031, &[0x02]),
            read(0x0031, &[0x03]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = sensor_in(i2c, Ranging(CALIBRATION));

        assert!(!sensor.is_data_ready().unwrap());
        assert!(sensor.is_data_ready().unwrap());

        done.done();
    }

    #[test]
    fn poll_ready_times_out_only_after_the_bound() {
        let expectations: Vec<_> = (0..=3).map(|_| read(0x0031, &[0x00])).collect();
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = sensor_in(i2c, Ranging(CALIBRATION));

        assert!(matches!(sensor.poll_ready(3), Err(Error::MeasurementTimeout)));
        let (_, delay) = sensor.release();
        assert_eq!(delay.total_ns(), 3_000_000);

        done.done();
    }

    #[test]
    fn read_result_refines_a_complete_range_and_clears_interrupt() {
        let expectations = result_read(0x09, peak_at_eight());
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = sensor_in(i2c, Ranging(CALIBRATION));

        let (histogram, estimate) = sensor.read_result().unwrap();
        assert_eq!(histogram.stream_count, 0x07);
        assert_eq!(histogram.bins[8], 300);
        assert_eq!(estimate.range_status, RangeStatus::RangeComplete);
        assert_eq!(estimate.peak_bin, 8);
        assert!((estimate.coarse_distance_mm - 120.0).abs() < 1e-4);
        let refined = estimate.refined_bin.unwrap();
        assert!((refined - 8.0116).abs() < 1e-3);
        assert!((estimate.distance_mm - refined * 15.0).abs() < 1e-3);

        done.done();
    }

    #[test]
    fn next_measurement_returns_the_valid_estimate() {
        let mut expectations = vec![read(0x0031, &[0x00]), read(0x0031, &[0x01])];
        expectations.extend(result_read(0x09, peak_at_eight()));
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = sensor_in(i2c, Ranging(CALIBRATION));

        let estimate = sensor.next_measurement().unwrap();
        assert_eq!(estimate.peak_bin, 8);
        assert!(estimate.is_valid());

        done.done();
    }

    #[test]
    fn next_measurement_reports_raw_status_of_a_failed_range() {
        let mut expectations = vec![read(0x0031, &[0x01])];
        expectations.extend(result_read(0x02, peak_at_eight()));
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = sensor_in(i2c, Ranging(CALIBRATION));

        assert!(matches!(
            sensor.next_measurement(),
            Err(Error::RangeStatusError(0x02))
        ));

        done.done();
    }

    #[test]
    fn oscillator_scaled_policy_uses_calibrated_frequency() {
        let mut bins = [0u32; HISTOGRAM_BINS];
        bins[10] = 500;
        let expectations = result_read(0x09, bins);
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        // Half the nominal frequency doubles the bin width to 30 mm
        let calibration = Calibration {
            fast_osc_frequency: 0x5E66,
            ..CALIBRATION
        };
        let mut sensor = sensor_in(i2c, Ranging(calibration));
        sensor.config.estimator.bin_width = BinWidthPolicy::OscillatorScaled;

        let (_, estimate) = sensor.read_result().unwrap();
        assert_eq!(estimate.peak_bin, 10);
        assert!((estimate.coarse_distance_mm - 300.0).abs() < 1e-3);
        assert!((estimate.distance_mm - 300.0).abs() < 1e-3);

        done.done();
    }
}
