//! Duty-cycled sampling of several supply rails.
//!
//! Each rail has its own INA231. Rails are initialized once and then kept in shutdown between
//! samples: every sample wakes the device, reads current, power and bus voltage, and shuts it
//! down again. Results are reported per rail so a caller can react to the one that failed.

use core::fmt;

use crate::alert::{AlertFunction, Latch, Polarity};
use crate::bus::Bus;
use crate::driver::{INA231Driver, INA231Error, INA231InitConfig};
use crate::register::{Register, Unit};
use embedded_hal::delay::DelayNs;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RailConfig {
    /// Label used in logs
    pub name: &'static str,
    /// Bus address of the rail's INA231
    pub address: u8,
    /// Shunt resistor in micro-ohms
    pub shunt_resistance_uohm: u32,
    /// Current LSB in micro-amps
    pub current_lsb_ua: u32,
}

/// One measurement of a rail.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub bus_voltage_mv: i32,
    pub current_ua: i32,
    pub power_uw: i32,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus voltage = {} {} || Current = {} {} || Power = {} {}",
            self.bus_voltage_mv,
            Unit::Millivolts.symbol(),
            self.current_ua,
            Unit::Microamps.symbol(),
            self.power_uw,
            Unit::Microwatts.symbol()
        )
    }
}

pub struct Rail<Delay> {
    config: RailConfig,
    driver: INA231Driver<Delay>,
}

impl<Delay> Rail<Delay>
where
    Delay: DelayNs,
{
    pub fn new(config: RailConfig, delay: Delay, init_config: INA231InitConfig) -> Self {
        Self {
            config,
            driver: INA231Driver::new(config.address, delay, init_config),
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn driver(&mut self) -> &mut INA231Driver<Delay> {
        &mut self.driver
    }

    /// Calibrates the device, routes conversion ready to the alert pin and shuts it down.
    ///
    /// The device is shut down even when calibration fails. A failed shutdown is logged but not
    /// reported.
    pub fn initialize<B: Bus>(&mut self, bus: &mut B) -> Result<(), INA231Error<B::Error>> {
        if !self.driver.available(bus) {
            log_warn!("ina@{} enabling failed", self.config.name);
            return Err(INA231Error::DeviceUnavailable {
                address: self.config.address,
            });
        }

        let result = self
            .driver
            .init(
                bus,
                self.config.shunt_resistance_uohm,
                self.config.current_lsb_ua,
            )
            .and_then(|()| {
                self.driver.alert_enable_set(
                    bus,
                    AlertFunction::ConversionReady,
                    Polarity::ActiveLow,
                    Latch::Transparent,
                )
            });

        if !self.driver.power_down(bus) {
            log_warn!("ina@{} power down failed", self.config.name);
        }

        result
    }

    /// Wakes the device, reads it and puts it back in shutdown, whatever the outcome.
    pub fn sample<B: Bus>(&mut self, bus: &mut B) -> Result<Sample, INA231Error<B::Error>> {
        let result = self
            .driver
            .try_power_up(bus)
            .and_then(|()| self.read_sample(bus));

        if result.is_err() {
            log_warn!("ina@{} error showing the data", self.config.name);
        }
        self.driver.power_down(bus);

        result
    }

    fn read_sample<B: Bus>(&mut self, bus: &mut B) -> Result<Sample, INA231Error<B::Error>> {
        let current_ua = self.driver.format_read(bus, Register::Current)?.value;
        let power_uw = self.driver.format_read(bus, Register::Power)?.value;
        let bus_voltage_mv = self.driver.format_read(bus, Register::BusVoltage)?.value;

        Ok(Sample {
            bus_voltage_mv,
            current_ua,
            power_uw,
        })
    }
}

/// Initializes every rail in order and returns one result per rail.
pub fn initialize_all<B, Delay, const N: usize>(
    bus: &mut B,
    rails: &mut [Rail<Delay>; N],
) -> [Result<(), INA231Error<B::Error>>; N]
where
    B: Bus,
    Delay: DelayNs,
{
    let results = core::array::from_fn(|i| rails[i].initialize(bus));

    if results.iter().all(Result::is_ok) {
        log_debug!("All ina231 initialized");
    }

    results
}

/// Samples every rail in order and returns one result per rail.
pub fn sample_all<B, Delay, const N: usize>(
    bus: &mut B,
    rails: &mut [Rail<Delay>; N],
) -> [Result<Sample, INA231Error<B::Error>>; N]
where
    B: Bus,
    Delay: DelayNs,
{
    core::array::from_fn(|i| rails[i].sample(bus))
}
