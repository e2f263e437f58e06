use crate::bus::Bus;
use crate::register::{
    Configuration, Register, Unit, CALIBRATION_SCALE, CONFIG_SHUTDOWN, CONVERSION_READY_FLAG,
    DEFAULT_ADDRESS, POWER_LSB_RATIO,
};
use embedded_hal::delay::DelayNs;

/// What a bounded poll was waiting for when it gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitFor {
    BusReady,
    ConversionReady,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum INA231Error<E> {
    /// The register address is outside `0x00..=0x07`.
    InvalidRegister(u8),
    /// Measurement registers cannot be written.
    ReadOnlyRegister(Register),
    /// The bus transaction failed.
    Bus(E),
    /// A bounded poll ran out of attempts.
    Timeout(WaitFor),
    /// The conversion ready flag is not set yet. Polling again resolves it.
    ConversionNotReady,
    /// Writing the configuration word during initialization failed.
    ConfigWriteFailed(E),
    /// Writing the calibration register during initialization failed.
    CalibrationWriteFailed(E),
    /// The shunt resistance and current LSB do not give a usable calibration.
    InvalidCalibration {
        shunt_resistance_uohm: u32,
        current_lsb_ua: u32,
    },
    /// The register scales with the current LSB but the handle was never initialized.
    NotCalibrated,
    /// The configuration read back after a wake up differs from the one written.
    PowerUpVerificationFailed { expected: u16, actual: u16 },
    /// The availability check failed.
    DeviceUnavailable { address: u8 },
}

/// Bounds every wait of the driver: `max_attempts` checks, `backoff_us` apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub backoff_us: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            backoff_us: 100,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct INA231InitConfig {
    /// The configuration word written at initialization and at every power up
    pub configuration: Configuration,
    /// Bounds for bus readiness and conversion ready polling
    pub poll: PollPolicy,
}

/// Conversion constants derived once by [`INA231Driver::init`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    shunt_resistance_uohm: u32,
    current_lsb_ua: u32,
    power_lsb_uw: u32,
    register_value: u16,
}

impl Calibration {
    ///
    ///
    /// # Arguments
    ///
    /// * `shunt_resistance_uohm`: The shunt resistor in micro-ohms.
    /// * `current_lsb_ua`: The smallest resolvable current step in micro-amps.
    ///
    /// returns: `None` if the calibration register would be zero or overflow, or if a full scale
    /// power reading would not fit an `i32`.
    pub fn new(shunt_resistance_uohm: u32, current_lsb_ua: u32) -> Option<Self> {
        let divisor = u64::from(shunt_resistance_uohm) * u64::from(current_lsb_ua);
        if divisor == 0 {
            return None;
        }

        // Ceiling division: truncating would under-range the ADC.
        let register_value = u16::try_from(CALIBRATION_SCALE.div_ceil(divisor)).ok()?;
        let power_lsb_uw = current_lsb_ua.checked_mul(POWER_LSB_RATIO)?;
        if u64::from(power_lsb_uw) * u64::from(u16::MAX) > i32::MAX as u64 {
            return None;
        }

        Some(Self {
            shunt_resistance_uohm,
            current_lsb_ua,
            power_lsb_uw,
            register_value,
        })
    }

    pub fn shunt_resistance_uohm(&self) -> u32 {
        self.shunt_resistance_uohm
    }

    pub fn current_lsb_ua(&self) -> u32 {
        self.current_lsb_ua
    }

    pub fn power_lsb_uw(&self) -> u32 {
        self.power_lsb_uw
    }

    /// The value written to [`Register::Calibration`].
    pub fn register_value(&self) -> u16 {
        self.register_value
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Active,
    Shutdown,
}

/// A register value converted to physical units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub register: Register,
    pub value: i32,
    pub unit: Unit,
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.unit {
            Unit::Raw => write!(f, "{:#06x}", self.value),
            unit => write!(f, "{} {}", self.value, unit.symbol()),
        }
    }
}

/// One INA231 on a shared bus.
///
/// The handle never owns the bus. It is passed to every operation so several handles can take
/// turns on the same bus.
pub struct INA231Driver<Delay> {
    address: u8,
    delay: Delay,
    configuration: Configuration,
    poll: PollPolicy,
    calibration: Option<Calibration>,
    power_state: Option<PowerState>,
}

impl<Delay> INA231Driver<Delay>
where
    Delay: DelayNs,
{
    ///
    ///
    /// # Arguments
    ///
    /// * `address`: The 7-bit bus address of the device.
    /// * `delay`: The delay used to back off between polls.
    /// * `config`: The configuration word and polling bounds.
    ///
    /// returns: An uncalibrated handle. Call [`INA231Driver::init`] before reading current or
    /// power.
    pub fn new(address: u8, delay: Delay, config: INA231InitConfig) -> Self {
        Self {
            address,
            delay,
            configuration: config.configuration,
            poll: config.poll,
            calibration: None,
            power_state: None,
        }
    }

    /// A handle at [`DEFAULT_ADDRESS`] with the default configuration.
    pub fn with_defaults(delay: Delay) -> Self {
        Self::new(DEFAULT_ADDRESS, delay, INA231InitConfig::default())
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn configuration(&self) -> Configuration {
        self.configuration
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// `None` until the first power up or power down, and after one that failed half way.
    pub fn power_state(&self) -> Option<PowerState> {
        self.power_state
    }

    /// Whether the bus reports itself ready for this device within the poll bounds.
    pub fn available<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.wait_bus_ready(bus).is_ok() {
            true
        } else {
            log_warn!("ina@{:#x} is not available", self.address);
            false
        }
    }

    pub fn read<B: Bus>(
        &mut self,
        bus: &mut B,
        register: Register,
    ) -> Result<u16, INA231Error<B::Error>> {
        self.wait_bus_ready(bus)?;

        let mut buffer = [0u8; 2];
        bus.read_burst(self.address, register.address(), &mut buffer)
            .map_err(INA231Error::Bus)?;

        let value = u16::from_be_bytes(buffer);
        log_trace!("ina@{:#x} read {:?} = {:#x}", self.address, register, value);

        Ok(value)
    }

    pub fn write<B: Bus>(
        &mut self,
        bus: &mut B,
        register: Register,
        value: u16,
    ) -> Result<(), INA231Error<B::Error>> {
        if register.is_read_only() {
            log_warn!("ina@{:#x} {:?} is read-only", self.address, register);
            return Err(INA231Error::ReadOnlyRegister(register));
        }

        self.wait_bus_ready(bus)?;

        log_trace!("ina@{:#x} write {:?} = {:#x}", self.address, register, value);
        bus.write_burst(self.address, register.address(), value.to_be_bytes())
            .map_err(|e| {
                log_warn!("ina@{:#x} failed to write {:?}", self.address, register);
                INA231Error::Bus(e)
            })
    }

    /// [`INA231Driver::read`] for an untyped register address.
    pub fn read_raw<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u8,
    ) -> Result<u16, INA231Error<B::Error>> {
        let register = self.checked_register(address)?;
        self.read(bus, register)
    }

    /// [`INA231Driver::write`] for an untyped register address.
    pub fn write_raw<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u8,
        value: u16,
    ) -> Result<(), INA231Error<B::Error>> {
        let register = self.checked_register(address)?;
        self.write(bus, register, value)
    }

    ///
    ///
    /// # Arguments
    ///
    /// * `bus`: The bus the device sits on.
    /// * `shunt_resistance_uohm`: The shunt resistor in micro-ohms.
    /// * `current_lsb_ua`: The current LSB in micro-amps. The power LSB is 25 times this.
    ///
    /// returns: `InvalidCalibration` before any bus access if the parameters are unusable,
    /// `ConfigWriteFailed` or `CalibrationWriteFailed` if a write fails. The handle keeps its
    /// previous calibration on failure.
    pub fn init<B: Bus>(
        &mut self,
        bus: &mut B,
        shunt_resistance_uohm: u32,
        current_lsb_ua: u32,
    ) -> Result<(), INA231Error<B::Error>> {
        let calibration = Calibration::new(shunt_resistance_uohm, current_lsb_ua).ok_or(
            INA231Error::InvalidCalibration {
                shunt_resistance_uohm,
                current_lsb_ua,
            },
        )?;

        let config_word = self.configuration.bits();
        self.write(bus, Register::Configuration, config_word)
            .map_err(|e| match e {
                INA231Error::Bus(e) => INA231Error::ConfigWriteFailed(e),
                other => other,
            })?;

        self.write(bus, Register::Calibration, calibration.register_value())
            .map_err(|e| match e {
                INA231Error::Bus(e) => INA231Error::CalibrationWriteFailed(e),
                other => other,
            })?;

        log_debug!(
            "ina@{:#x} calibrated: {:#x} (shunt {} uOhm, lsb {} uA)",
            self.address,
            calibration.register_value(),
            shunt_resistance_uohm,
            current_lsb_ua
        );
        self.calibration = Some(calibration);

        Ok(())
    }

    /// Waits for a finished conversion, then reads `register` and converts it to its unit.
    pub fn format_read<B: Bus>(
        &mut self,
        bus: &mut B,
        register: Register,
    ) -> Result<Reading, INA231Error<B::Error>> {
        self.wait_conversion_ready(bus)?;
        self.read_scaled(bus, register)
    }

    /// Like [`INA231Driver::format_read`] but checks the conversion ready flag only once.
    pub fn try_format_read<B: Bus>(
        &mut self,
        bus: &mut B,
        register: Register,
    ) -> Result<Reading, INA231Error<B::Error>> {
        if !self.try_conversion_ready(bus)? {
            return Err(INA231Error::ConversionNotReady);
        }
        self.read_scaled(bus, register)
    }

    /// [`INA231Driver::format_read`] for an untyped register address.
    pub fn format_read_raw<B: Bus>(
        &mut self,
        bus: &mut B,
        address: u8,
    ) -> Result<Reading, INA231Error<B::Error>> {
        let register = self.checked_register(address)?;
        self.format_read(bus, register)
    }

    pub fn shunt_voltage_uv<B: Bus>(&mut self, bus: &mut B) -> Result<i32, INA231Error<B::Error>> {
        Ok(self.format_read(bus, Register::ShuntVoltage)?.value)
    }

    pub fn bus_voltage_mv<B: Bus>(&mut self, bus: &mut B) -> Result<i32, INA231Error<B::Error>> {
        Ok(self.format_read(bus, Register::BusVoltage)?.value)
    }

    pub fn current_ua<B: Bus>(&mut self, bus: &mut B) -> Result<i32, INA231Error<B::Error>> {
        Ok(self.format_read(bus, Register::Current)?.value)
    }

    pub fn power_uw<B: Bus>(&mut self, bus: &mut B) -> Result<i32, INA231Error<B::Error>> {
        Ok(self.format_read(bus, Register::Power)?.value)
    }

    /// Puts the device in shutdown. On failure the power state becomes unknown.
    pub fn try_power_down<B: Bus>(&mut self, bus: &mut B) -> Result<(), INA231Error<B::Error>> {
        match self.write(bus, Register::Configuration, CONFIG_SHUTDOWN) {
            Ok(()) => {
                self.power_state = Some(PowerState::Shutdown);
                Ok(())
            }
            Err(e) => {
                self.power_state = None;
                Err(e)
            }
        }
    }

    /// Writes the configuration word and confirms it by reading it back. There is no retry.
    pub fn try_power_up<B: Bus>(&mut self, bus: &mut B) -> Result<(), INA231Error<B::Error>> {
        self.power_state = None;

        let expected = self.configuration.bits();
        self.write(bus, Register::Configuration, expected)?;

        let actual = self.read(bus, Register::Configuration)?;
        if actual != expected {
            log_warn!(
                "ina@{:#x} could not power up: wrote {:#x}, read {:#x}",
                self.address,
                expected,
                actual
            );
            return Err(INA231Error::PowerUpVerificationFailed { expected, actual });
        }

        self.power_state = Some(PowerState::Active);
        Ok(())
    }

    pub fn power_down<B: Bus>(&mut self, bus: &mut B) -> bool {
        let result = self.try_power_down(bus);
        if result.is_err() {
            log_warn!("ina@{:#x} power down failed", self.address);
        }
        result.is_ok()
    }

    pub fn power_up<B: Bus>(&mut self, bus: &mut B) -> bool {
        self.try_power_up(bus).is_ok()
    }

    /// Reads the Mask/Enable register and returns the conversion ready flag.
    pub fn try_conversion_ready<B: Bus>(
        &mut self,
        bus: &mut B,
    ) -> Result<bool, INA231Error<B::Error>> {
        let mask_enable = self.read(bus, Register::MaskEnable)?;
        Ok(mask_enable & CONVERSION_READY_FLAG != 0)
    }

    /// Like [`INA231Driver::try_conversion_ready`] but a failed read counts as not ready.
    pub fn conversion_ready<B: Bus>(&mut self, bus: &mut B) -> bool {
        self.try_conversion_ready(bus).unwrap_or(false)
    }

    fn read_scaled<B: Bus>(
        &mut self,
        bus: &mut B,
        register: Register,
    ) -> Result<Reading, INA231Error<B::Error>> {
        let scaling = register.scaling();
        let (current_lsb_ua, power_lsb_uw) = match (self.calibration, scaling.needs_calibration()) {
            (Some(calibration), _) => (calibration.current_lsb_ua, calibration.power_lsb_uw),
            (None, false) => (0, 0),
            (None, true) => return Err(INA231Error::NotCalibrated),
        };

        let raw = self.read(bus, register)?;

        // Only reachable with LSBs that `Calibration::new` would have rejected.
        let value = scaling.apply(raw, current_lsb_ua, power_lsb_uw).ok_or(
            INA231Error::InvalidCalibration {
                shunt_resistance_uohm: self.calibration.map_or(0, |c| c.shunt_resistance_uohm),
                current_lsb_ua,
            },
        )?;

        Ok(Reading {
            register,
            value,
            unit: register.unit(),
        })
    }

    fn checked_register<E>(&self, address: u8) -> Result<Register, INA231Error<E>> {
        Register::try_from(address).map_err(|address| {
            log_warn!("ina@{:#x} register {:#x} does not exist", self.address, address);
            INA231Error::InvalidRegister(address)
        })
    }

    fn wait_bus_ready<B: Bus>(&mut self, bus: &mut B) -> Result<(), INA231Error<B::Error>> {
        for attempt in 0..self.poll.max_attempts.max(1) {
            if bus.is_ready(self.address) {
                return Ok(());
            }
            if attempt + 1 < self.poll.max_attempts {
                self.delay.delay_us(self.poll.backoff_us);
            }
        }

        log_warn!("ina@{:#x} timed out waiting for the bus", self.address);
        Err(INA231Error::Timeout(WaitFor::BusReady))
    }

    /// A failed transfer while polling counts as not ready and uses up an attempt. A bus that
    /// never becomes ready ends the poll at once.
    fn wait_conversion_ready<B: Bus>(&mut self, bus: &mut B) -> Result<(), INA231Error<B::Error>> {
        for attempt in 0..self.poll.max_attempts.max(1) {
            match self.try_conversion_ready(bus) {
                Ok(true) => return Ok(()),
                Ok(false) | Err(INA231Error::Bus(_)) => {}
                Err(e) => return Err(e),
            }
            if attempt + 1 < self.poll.max_attempts {
                self.delay.delay_us(self.poll.backoff_us);
            }
        }

        log_warn!("ina@{:#x} timed out waiting for a conversion", self.address);
        Err(INA231Error::Timeout(WaitFor::ConversionReady))
    }
}

#[cfg(feature = "std")]
impl<E> std::fmt::Display for INA231Error<E>
where
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            INA231Error::InvalidRegister(address) => {
                write!(f, "Register 0x{address:02X} does not exist")
            }
            INA231Error::ReadOnlyRegister(register) => write!(f, "{register:?} is read-only"),
            INA231Error::Bus(e) => write!(f, "Bus Error: {e:?}"),
            INA231Error::Timeout(WaitFor::BusReady) => write!(f, "Timed out waiting for the bus"),
            INA231Error::Timeout(WaitFor::ConversionReady) => {
                write!(f, "Timed out waiting for a conversion")
            }
            INA231Error::ConversionNotReady => write!(f, "Conversion not ready"),
            INA231Error::ConfigWriteFailed(e) => {
                write!(f, "Failed to write the configuration: {e:?}")
            }
            INA231Error::CalibrationWriteFailed(e) => {
                write!(f, "Failed to write the calibration: {e:?}")
            }
            INA231Error::InvalidCalibration {
                shunt_resistance_uohm,
                current_lsb_ua,
            } => write!(
                f,
                "No usable calibration for a {shunt_resistance_uohm} uOhm shunt and a {current_lsb_ua} uA LSB"
            ),
            INA231Error::NotCalibrated => write!(f, "INA231 is not calibrated"),
            INA231Error::PowerUpVerificationFailed { expected, actual } => write!(
                f,
                "Power up failed: wrote 0x{expected:04X}, read back 0x{actual:04X}"
            ),
            INA231Error::DeviceUnavailable { address } => {
                write!(f, "INA231 at 0x{address:02X} is not available")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for INA231Error<E>
where
    E: std::fmt::Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
