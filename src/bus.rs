//! Register access layer.
//!
//! Every access is a single bus transaction: the 16-bit register index followed by
//! the big-endian payload for writes, or a write-read for reads. Transport errors are
//! returned unchanged as [`Error::I2cError`]; nothing here retries.

use crate::register::{be_value, Setting, Width};
use crate::{DelayNs, Error, I2c, VL53L3cx};

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
    /// Writes a single byte to a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_byte<R>(&mut self, register_address: R, value: u8) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        self.write_register(register_address, &[value]).await
    }

    /// Reads a single byte from a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_byte<R>(&mut self, register_address: R) -> Result<u8, Error<E>>
    where
        R: Into<u16>,
    {
        let mut read_buffer = [0u8; 1];
        self.read_block(register_address, &mut read_buffer).await?;
        Ok(read_buffer[0])
    }

    /// Writes a 16-bit word to a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_word<R>(&mut self, register_address: R, value: u16) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        self.write_register(register_address, &value.to_be_bytes())
            .await
    }

    /// Reads a 16-bit word from a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_word<R>(&mut self, register_address: R) -> Result<u16, Error<E>>
    where
        R: Into<u16>,
    {
        let mut read_buffer = [0u8; 2];
        self.read_block(register_address, &mut read_buffer).await?;
        Ok(u16::from_be_bytes(read_buffer))
    }

    /// Writes a 32-bit double word to a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_dword<R>(&mut self, register_address: R, value: u32) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        self.write_register(register_address, &value.to_be_bytes())
            .await
    }

    /// Reads a 32-bit double word from a sensor register.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_dword<R>(&mut self, register_address: R) -> Result<u32, Error<E>>
    where
        R: Into<u16>,
    {
        let mut read_buffer = [0u8; 4];
        self.read_block(register_address, &mut read_buffer).await?;
        Ok(u32::from_be_bytes(read_buffer))
    }

    /// Writes 1 to 4 payload bytes starting at `register_address` in one transaction.
    ///
    /// # Errors
    ///
    /// * `Err(Error::InvalidArgument)` - If the payload is empty or longer than 4 bytes
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_register<R>(
        &mut self,
        register_address: R,
        payload: &[u8],
    ) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let reg: u16 = register_address.into();
        if Width::from_len(payload.len()).is_none() {
            error!("Invalid payload length {} for register {:#x}", payload.len(), reg);
            return Err(Error::InvalidArgument);
        }
        let mut buffer = [0u8; 6];
        buffer[0..2].copy_from_slice(&reg.to_be_bytes());
        buffer[2..2 + payload.len()].copy_from_slice(payload);
        trace!("write {:#x} ({} bytes)", reg, payload.len());
        self.i2c
            .write(self.address, &buffer[..2 + payload.len()])
            .await?;
        Ok(())
    }

    /// Reads a field of the given width and returns it right aligned.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_register<R>(
        &mut self,
        register_address: R,
        width: Width,
    ) -> Result<u32, Error<E>>
    where
        R: Into<u16>,
    {
        let mut read_buffer = [0u8; 4];
        let read_buffer = &mut read_buffer[..width.bytes()];
        self.read_block(register_address, read_buffer).await?;
        Ok(be_value(read_buffer))
    }

    /// Burst-reads `buffer.len()` consecutive bytes starting at `register_address`.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn read_block<R>(
        &mut self,
        register_address: R,
        buffer: &mut [u8],
    ) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let reg: u16 = register_address.into();
        trace!("read {:#x} ({} bytes)", reg, buffer.len());
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), buffer)
            .await?;
        Ok(())
    }

    /// Read-modify-write of the bits selected by `mask`; all other bits are preserved.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn modify_byte<R>(
        &mut self,
        register_address: R,
        mask: u8,
        bits: u8,
    ) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let reg: u16 = register_address.into();
        let current = self.read_byte(reg).await?;
        self.write_byte(reg, (current & !mask) | (bits & mask)).await
    }

    /// Writes one register set entry.
    ///
    /// # Errors
    ///
    /// * `Err(Error::I2cError(E))` - If there was an I2C communication error
    pub async fn write_setting(&mut self, setting: &Setting) -> Result<(), Error<E>> {
        let (payload, len) = setting.to_be_bytes();
        self.write_register(setting.register, &payload[..len]).await
    }
}

#[cfg(all(test, not(feature = "async")))]
mod tests {
    use crate::register::{Register, Width};
    use crate::testing::{read, write, RecordingDelay, ADDR};
    use crate::{Error, VL53L3cx};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn multi_byte_accesses_are_single_big_endian_transactions() {
        let expectations = [
            write(0x006C, &[0x00, 0x00, 0x03, 0xE8]),
            write(0x0072, &[0x01, 0x2C]),
            read(0x0686, &[0x12, 0x34, 0x56, 0x78]),
            read(0x0088, &[0xAB, 0xCD, 0xEF]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = VL53L3cx::new(i2c, RecordingDelay::default());

        sensor.write_dword(Register::SystemIntermeasurementPeriod, 1000).unwrap();
        sensor.write_word(Register::SystemThreshHigh, 300).unwrap();
        assert_eq!(sensor.read_dword(Register::RangingCoreNvmCtrlDataoutMmm).unwrap(), 0x1234_5678);
        assert_eq!(
            sensor.read_register(Register::ResultInterruptStatus, Width::Triple).unwrap(),
            0x00AB_CDEF
        );

        done.done();
    }

    #[test]
    fn modify_byte_preserves_other_bits() {
        let expectations = [
            read(0x002E, &[0b1010_0110]),
            write(0x002E, &[0b1010_0111]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = VL53L3cx::new(i2c, RecordingDelay::default());

        sensor.modify_byte(Register::PadI2cHvExtsupConfig, 0x01, 0x01).unwrap();

        done.done();
    }

    #[test]
    fn oversized_payload_is_rejected_before_bus_access() {
        let i2c = I2cMock::new(&[]);
        let mut done = i2c.clone();
        let mut sensor = VL53L3cx::new(i2c, RecordingDelay::default());

        let result = sensor.write_register(0x0000u16, &[0; 5]);
        assert!(matches!(result, Err(Error::InvalidArgument)));
        let result = sensor.write_register(0x0000u16, &[]);
        assert!(matches!(result, Err(Error::InvalidArgument)));

        done.done();
    }

    #[test]
    fn transport_errors_propagate_unchanged() {
        let expectations = [Transaction::write_read(ADDR, vec![0x00, 0xE5], vec![0x00])
            .with_error(ErrorKind::Other)];
        let i2c = I2cMock::new(&expectations);
        let mut done = i2c.clone();
        let mut sensor = VL53L3cx::new(i2c, RecordingDelay::default());

        let result = sensor.read_byte(Register::FirmwareSystemStatus);
        assert!(matches!(result, Err(Error::I2cError(ErrorKind::Other))));

        done.done();
    }
}
