//!
//! A platform-agnostic driver for the INA231 current, voltage and power monitor. Built using embedded-hal.
//!
//! The driver calibrates the device from the shunt resistor and the wanted current resolution,
//! converts raw register counts to micro-volts, milli-volts, micro-amps and micro-watts, configures
//! the alert pin and duty-cycles the device between shutdown and active mode. Every wait is
//! bounded by a [`PollPolicy`].
//!
//! Handles do not own the bus. Several INA231 on one I2C bus each get their own
//! [`INA231Driver`] and the bus is passed to every call:
//!
//! ```
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! # use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
//! use ina231::{INA231Driver, INA231InitConfig, Register};
//!
//! # let expectations = [
//! #     Transaction::write(0x40, vec![0x00, 0x45, 0x27]),
//! #     Transaction::write(0x40, vec![0x05, 0x42, 0xAB]),
//! #     Transaction::write_read(0x40, vec![0x06], vec![0x04, 0x08]),
//! #     Transaction::write_read(0x40, vec![0x02], vec![0x0A, 0x50]),
//! # ];
//! # let mut i2c = Mock::new(&expectations);
//! let mut ina = INA231Driver::new(0x40, NoopDelay::new(), INA231InitConfig::default());
//!
//! // 30 mOhm shunt, 10 uA per current LSB
//! ina.init(&mut i2c, 30_000, 10)?;
//! assert_eq!(ina.bus_voltage_mv(&mut i2c)?, 3300);
//! # i2c.done();
//! # Ok::<(), ina231::INA231Error<embedded_hal::i2c::ErrorKind>>(())
//! ```
//!
//! Logging goes through `defmt` or `log` when the feature of the same name is enabled.
//!

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod alert;
pub mod bus;
pub mod driver;
pub mod monitor;
pub mod register;

pub use alert::{AlertFunction, Latch, MaskEnable, Polarity};
pub use bus::Bus;
pub use driver::*;
pub use monitor::{initialize_all, sample_all, Rail, RailConfig, Sample};
pub use register::{Configuration, Register, Scaling, Unit};
