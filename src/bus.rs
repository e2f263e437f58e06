//! The bus transaction primitive the driver runs on.
//!
//! Every INA231 transaction moves exactly two data bytes to or from a single register, so the
//! driver only needs addressed two-byte burst reads and writes plus a readiness query. Any
//! [`embedded_hal::i2c::I2c`] implementation provides this out of the box.

use embedded_hal::i2c::{ErrorType, I2c};

pub trait Bus {
    /// Transport level error, surfaced as [`INA231Error::Bus`](crate::INA231Error::Bus).
    type Error;

    /// Whether the bus can accept a transaction for the device at `address`.
    fn is_ready(&mut self, address: u8) -> bool;

    /// Reads two bytes starting at `register`, most significant byte first.
    fn read_burst(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8; 2],
    ) -> Result<(), Self::Error>;

    /// Writes two bytes starting at `register`, most significant byte first.
    fn write_burst(&mut self, address: u8, register: u8, data: [u8; 2]) -> Result<(), Self::Error>;
}

/// An I2C peripheral handed out by a HAL is already initialized, so it is always ready.
impl<T> Bus for T
where
    T: I2c,
{
    type Error = <T as ErrorType>::Error;

    fn is_ready(&mut self, _address: u8) -> bool {
        true
    }

    fn read_burst(
        &mut self,
        address: u8,
        register: u8,
        buffer: &mut [u8; 2],
    ) -> Result<(), Self::Error> {
        self.write_read(address, &[register], buffer)
    }

    fn write_burst(&mut self, address: u8, register: u8, data: [u8; 2]) -> Result<(), Self::Error> {
        self.write(address, &[register, data[0], data[1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn i2c_read_sends_register_pointer_then_reads_two_bytes() {
        let expectations = [I2cTransaction::write_read(0x40, vec![0x02], vec![0x12, 0x34])];
        let mut i2c = I2cMock::new(&expectations);

        let mut buffer = [0u8; 2];
        i2c.read_burst(0x40, 0x02, &mut buffer).unwrap();
        assert_eq!(buffer, [0x12, 0x34]);

        i2c.done();
    }

    #[test]
    fn i2c_write_sends_pointer_and_payload_in_one_transaction() {
        let expectations = [I2cTransaction::write(0x41, vec![0x05, 0x42, 0xAB])];
        let mut i2c = I2cMock::new(&expectations);

        i2c.write_burst(0x41, 0x05, [0x42, 0xAB]).unwrap();
        assert!(i2c.is_ready(0x41));

        i2c.done();
    }

    #[test]
    fn i2c_errors_pass_through() {
        let expectations =
            [I2cTransaction::write_read(0x40, vec![0x00], vec![0, 0]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);

        let mut buffer = [0u8; 2];
        assert_eq!(i2c.read_burst(0x40, 0x00, &mut buffer), Err(ErrorKind::Other));

        i2c.done();
    }
}
