//! Alert pin configuration through the Mask/Enable and Alert Limit registers.

use crate::bus::Bus;
use crate::driver::{INA231Driver, INA231Error};
use crate::register::{Register, ALERT_CONFIG_MASK, ALERT_FUNCTION_FLAG, CONVERSION_READY_FLAG};
use embedded_hal::delay::DelayNs;

/// The condition that asserts the alert pin. The discriminant is its Mask/Enable bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertFunction {
    ShuntOverVoltage = 15,
    ShuntUnderVoltage = 14,
    BusOverVoltage = 13,
    BusUnderVoltage = 12,
    PowerOverLimit = 11,
    ConversionReady = 10,
}

impl AlertFunction {
    pub const ALL: [AlertFunction; 6] = [
        AlertFunction::ShuntOverVoltage,
        AlertFunction::ShuntUnderVoltage,
        AlertFunction::BusOverVoltage,
        AlertFunction::BusUnderVoltage,
        AlertFunction::PowerOverLimit,
        AlertFunction::ConversionReady,
    ];

    pub const fn bit(self) -> u8 {
        self as u8
    }

    pub const fn mask(self) -> u16 {
        1 << self.bit()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveLow = 0,
    ActiveHigh = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Latch {
    /// The alert clears as soon as the condition does.
    Transparent = 0,
    /// The alert stays asserted until Mask/Enable is read.
    Latched = 1,
}

/// A Mask/Enable register value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MaskEnable(pub u16);

impl MaskEnable {
    pub const fn new(function: AlertFunction, polarity: Polarity, latch: Latch) -> Self {
        Self(function.mask() | (polarity as u16) << 1 | latch as u16)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// The highest priority alert function enabled, if any.
    pub fn alert_function(self) -> Option<AlertFunction> {
        AlertFunction::ALL
            .into_iter()
            .find(|function| self.0 & ALERT_CONFIG_MASK & function.mask() != 0)
    }

    pub const fn alert_function_flag(self) -> bool {
        self.0 & ALERT_FUNCTION_FLAG != 0
    }

    pub const fn conversion_ready(self) -> bool {
        self.0 & CONVERSION_READY_FLAG != 0
    }

    pub const fn polarity(self) -> Polarity {
        if self.0 & (1 << 1) != 0 {
            Polarity::ActiveHigh
        } else {
            Polarity::ActiveLow
        }
    }

    pub const fn latch(self) -> Latch {
        if self.0 & 1 != 0 {
            Latch::Latched
        } else {
            Latch::Transparent
        }
    }
}

impl From<MaskEnable> for u16 {
    fn from(mask_enable: MaskEnable) -> u16 {
        mask_enable.0
    }
}

impl<Delay> INA231Driver<Delay>
where
    Delay: DelayNs,
{
    /// Routes `function` to the alert pin. Every other alert function is disabled.
    pub fn alert_enable_set<B: Bus>(
        &mut self,
        bus: &mut B,
        function: AlertFunction,
        polarity: Polarity,
        latch: Latch,
    ) -> Result<(), INA231Error<B::Error>> {
        let word = MaskEnable::new(function, polarity, latch);
        log_debug!("ina@{:#x} alert on {:?}", self.address(), function);
        self.write(bus, Register::MaskEnable, word.bits())
    }

    /// Reading Mask/Enable clears a latched alert and the conversion ready flag.
    pub fn alert_enable_read<B: Bus>(&mut self, bus: &mut B) -> Result<u16, INA231Error<B::Error>> {
        self.read(bus, Register::MaskEnable)
    }

    pub fn mask_enable<B: Bus>(
        &mut self,
        bus: &mut B,
    ) -> Result<MaskEnable, INA231Error<B::Error>> {
        self.alert_enable_read(bus).map(MaskEnable)
    }

    /// The limit is compared against the register selected by the alert function.
    pub fn alert_limit_set<B: Bus>(
        &mut self,
        bus: &mut B,
        limit: u16,
    ) -> Result<(), INA231Error<B::Error>> {
        self.write(bus, Register::AlertLimit, limit)
    }

    pub fn alert_limit_read<B: Bus>(&mut self, bus: &mut B) -> Result<u16, INA231Error<B::Error>> {
        self.read(bus, Register::AlertLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::INA231InitConfig;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x45;

    fn driver() -> INA231Driver<NoopDelay> {
        INA231Driver::new(ADDR, NoopDelay::new(), INA231InitConfig::default())
    }

    #[test]
    fn conversion_ready_alert_word() {
        let expectations = [I2cTransaction::write(ADDR, vec![0x06, 0x04, 0x00])];
        let mut i2c = I2cMock::new(&expectations);
        let mut driver = driver();

        driver
            .alert_enable_set(
                &mut i2c,
                AlertFunction::ConversionReady,
                Polarity::ActiveLow,
                Latch::Transparent,
            )
            .unwrap();

        i2c.done();
    }

    #[test]
    fn alert_word_combines_function_polarity_and_latch() {
        assert_eq!(
            MaskEnable::new(
                AlertFunction::ShuntOverVoltage,
                Polarity::ActiveHigh,
                Latch::Latched
            )
            .bits(),
            0x8003
        );
        assert_eq!(
            MaskEnable::new(
                AlertFunction::PowerOverLimit,
                Polarity::ActiveLow,
                Latch::Latched
            )
            .bits(),
            0x0801
        );

        for function in AlertFunction::ALL {
            let word = MaskEnable::new(function, Polarity::ActiveHigh, Latch::Transparent);
            assert_eq!(word.alert_function(), Some(function));
            assert_eq!(word.polarity(), Polarity::ActiveHigh);
            assert_eq!(word.latch(), Latch::Transparent);
        }
    }

    #[test]
    fn mask_enable_flags() {
        let flags = MaskEnable(0x0418);
        assert_eq!(flags.alert_function(), Some(AlertFunction::ConversionReady));
        assert!(flags.alert_function_flag());
        assert!(flags.conversion_ready());

        let idle = MaskEnable(0x0000);
        assert_eq!(idle.alert_function(), None);
        assert!(!idle.conversion_ready());
    }

    #[test]
    fn alert_registers_pass_through() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x07, 0x0F, 0xA0]),
            I2cTransaction::write_read(ADDR, vec![0x07], vec![0x0F, 0xA0]),
            I2cTransaction::write_read(ADDR, vec![0x06], vec![0x20, 0x10]),
            I2cTransaction::write_read(ADDR, vec![0x06], vec![0x20, 0x10]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut driver = driver();

        driver.alert_limit_set(&mut i2c, 0x0FA0).unwrap();
        assert_eq!(driver.alert_limit_read(&mut i2c), Ok(0x0FA0));
        assert_eq!(driver.alert_enable_read(&mut i2c), Ok(0x2010));

        let mask_enable = driver.mask_enable(&mut i2c).unwrap();
        assert_eq!(mask_enable.alert_function(), Some(AlertFunction::BusOverVoltage));
        assert!(mask_enable.alert_function_flag());

        i2c.done();
    }

    #[test]
    fn alert_write_failures_propagate() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![0x06, 0x20, 0x00]).with_error(ErrorKind::Other)
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut driver = driver();

        assert_eq!(
            driver.alert_enable_set(
                &mut i2c,
                AlertFunction::BusOverVoltage,
                Polarity::ActiveLow,
                Latch::Transparent
            ),
            Err(INA231Error::Bus(ErrorKind::Other))
        );

        i2c.done();
    }
}
