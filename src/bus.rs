//! Register-level access to the sensor.
//!
//! The driver only needs three primitives: read one register, burst-read a block and write
//! one register. Any [`embedded_hal::i2c::I2c`] implementation provides them through the
//! blanket impl below; hosts with an unusual transport implement [`RegisterBus`] directly.

use embedded_hal::i2c;

use crate::error::Bme680Error;

/// Byte-level register access to a device at a 7-bit bus address.
///
/// Implementations must report failures immediately. The driver never retries.
pub trait RegisterBus {
    type Error;

    /// Reads `buf.len()` consecutive registers starting at `reg`.
    fn read_block(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes `value` to register `reg`.
    fn write_register(&mut self, address: u8, reg: u8, value: u8) -> Result<(), Self::Error>;

    /// Reads a single register.
    fn read_register(&mut self, address: u8, reg: u8) -> Result<u8, Self::Error> {
        let mut buffer = [0];
        self.read_block(address, reg, &mut buffer)?;
        Ok(buffer[0])
    }
}

impl<I2C> RegisterBus for I2C
where
    I2C: i2c::I2c,
{
    type Error = I2C::Error;

    fn read_block(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.write_read(address, &[reg], buf)
    }

    fn write_register(&mut self, address: u8, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.write(address, &[reg, value])
    }
}

/// Driver-side helpers that attach the failing register to bus errors.
pub(crate) trait RegisterBusExt: RegisterBus {
    fn read_into(
        &mut self,
        address: u8,
        reg: u8,
        buf: &mut [u8],
    ) -> Result<(), Bme680Error<Self::Error>> {
        self.read_block(address, reg, buf)
            .map_err(|source| Bme680Error::Bus { register: reg, source })
    }

    fn read_reg_byte(&mut self, address: u8, reg: u8) -> Result<u8, Bme680Error<Self::Error>> {
        self.read_register(address, reg)
            .map_err(|source| Bme680Error::Bus { register: reg, source })
    }

    fn write_reg(
        &mut self,
        address: u8,
        reg: u8,
        value: u8,
    ) -> Result<(), Bme680Error<Self::Error>> {
        trace!("write {} <- {}", reg, value);
        self.write_register(address, reg, value)
            .map_err(|source| Bme680Error::Bus { register: reg, source })
    }

    /// Read-modify-write: replaces the bits in `mask` with `value`, keeps the rest.
    fn update_reg(
        &mut self,
        address: u8,
        reg: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), Bme680Error<Self::Error>> {
        let register = self.read_reg_byte(address, reg)?;
        self.write_reg(address, reg, (register & !mask) | (value & mask))
    }
}

impl<B: RegisterBus + ?Sized> RegisterBusExt for B {}
