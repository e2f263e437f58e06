//! INA231 register map, register units and the configuration word.

/// Default 7-bit bus address (A0 and A1 tied to GND).
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Shunt resistor fitted on the reference boards, in micro-ohms.
pub const DEFAULT_SHUNT_RESISTANCE_UOHM: u32 = 30_000;

/// Calibration value for a 30 mΩ shunt and a 10 µA current LSB.
pub const CALIBRATION_DEFAULT: u16 = 0x42AB;

/// Configuration word that puts the device in power-down mode.
pub const CONFIG_SHUTDOWN: u16 = 0x0000;

/// Conversion ready flag of the Mask/Enable register.
pub const CONVERSION_READY_FLAG: u16 = 1 << 3;

/// Alert function flag of the Mask/Enable register.
pub const ALERT_FUNCTION_FLAG: u16 = 1 << 4;

/// Alert function selection bits of the Mask/Enable register.
pub const ALERT_CONFIG_MASK: u16 = 0xFC00;

/// Fixed by the device: 0.00512 scaled to micro-amps and micro-ohms.
pub(crate) const CALIBRATION_SCALE: u64 = 5_120_000_000;

/// The power register LSB is always 25 times the current register LSB.
pub(crate) const POWER_LSB_RATIO: u32 = 25;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Configuration = 0x00,
    ShuntVoltage = 0x01,
    BusVoltage = 0x02,
    Power = 0x03,
    Current = 0x04,
    Calibration = 0x05,
    MaskEnable = 0x06,
    AlertLimit = 0x07,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::Configuration,
        Register::ShuntVoltage,
        Register::BusVoltage,
        Register::Power,
        Register::Current,
        Register::Calibration,
        Register::MaskEnable,
        Register::AlertLimit,
    ];

    pub const fn address(self) -> u8 {
        self as u8
    }

    /// Measurement result registers are written by the device only.
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Register::ShuntVoltage | Register::BusVoltage | Register::Power | Register::Current
        )
    }

    pub const fn unit(self) -> Unit {
        match self {
            Register::ShuntVoltage => Unit::Microvolts,
            Register::BusVoltage => Unit::Millivolts,
            Register::Power => Unit::Microwatts,
            Register::Current => Unit::Microamps,
            Register::Configuration
            | Register::Calibration
            | Register::MaskEnable
            | Register::AlertLimit => Unit::Raw,
        }
    }

    /// How a raw count of this register converts into [`Register::unit`].
    pub const fn scaling(self) -> Scaling {
        match self {
            // 2.5 µV per count
            Register::ShuntVoltage => Scaling::Fixed {
                numerator: 5,
                denominator: 2,
            },
            // 1.25 mV per count
            Register::BusVoltage => Scaling::Fixed {
                numerator: 5,
                denominator: 4,
            },
            Register::Power => Scaling::PowerLsb,
            Register::Current => Scaling::CurrentLsb,
            Register::Configuration
            | Register::Calibration
            | Register::MaskEnable
            | Register::AlertLimit => Scaling::Passthrough,
        }
    }
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        Register::ALL
            .get(address as usize)
            .copied()
            .ok_or(address)
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> u8 {
        register.address()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    Microvolts,
    Millivolts,
    Microwatts,
    Microamps,
    /// Register content without a physical unit.
    Raw,
}

impl Unit {
    pub const fn symbol(self) -> &'static str {
        match self {
            Unit::Microvolts => "uV",
            Unit::Millivolts => "mV",
            Unit::Microwatts => "uW",
            Unit::Microamps => "uA",
            Unit::Raw => "",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scaling {
    /// A device constant LSB, `numerator / denominator` units per count.
    Fixed { numerator: u32, denominator: u32 },
    /// The current LSB chosen at calibration.
    CurrentLsb,
    /// The power LSB derived at calibration.
    PowerLsb,
    Passthrough,
}

impl Scaling {
    pub const fn needs_calibration(self) -> bool {
        matches!(self, Scaling::CurrentLsb | Scaling::PowerLsb)
    }

    ///
    ///
    /// # Arguments
    ///
    /// * `raw`: The register count.
    /// * `current_lsb_ua`: Current LSB of the handle, only used by calibrated scalings.
    /// * `power_lsb_uw`: Power LSB of the handle, only used by calibrated scalings.
    ///
    /// returns: The count in physical units, rounded half up. `None` if the result does not fit
    /// an `i32`.
    pub fn apply(self, raw: u16, current_lsb_ua: u32, power_lsb_uw: u32) -> Option<i32> {
        let raw = u64::from(raw);
        let scaled = match self {
            Scaling::Fixed {
                numerator,
                denominator,
            } => {
                let denominator = u64::from(denominator);
                (raw * u64::from(numerator) + denominator / 2) / denominator
            }
            Scaling::CurrentLsb => raw * u64::from(current_lsb_ua),
            Scaling::PowerLsb => raw * u64::from(power_lsb_uw),
            Scaling::Passthrough => raw,
        };
        i32::try_from(scaled).ok()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Averaging {
    Avg1 = 0,
    Avg4 = 1,
    Avg16 = 2,
    Avg64 = 3,
    Avg128 = 4,
    Avg256 = 5,
    Avg512 = 6,
    Avg1024 = 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionTime {
    Us140 = 0,
    Us204 = 1,
    Us332 = 2,
    Us588 = 3,
    Us1100 = 4,
    Us2116 = 5,
    Us4156 = 6,
    Us8244 = 7,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    PowerDown = 0,
    ShuntTriggered = 1,
    BusTriggered = 2,
    ShuntAndBusTriggered = 3,
    ShuntContinuous = 5,
    BusContinuous = 6,
    ShuntAndBusContinuous = 7,
}

/// The Configuration register content.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Configuration {
    pub averaging: Averaging,
    pub bus_conversion_time: ConversionTime,
    pub shunt_conversion_time: ConversionTime,
    pub mode: OperatingMode,
}

impl Configuration {
    /// Bits 14..12 always read back as `100`.
    const FIXED_BITS: u16 = 0x4000;

    pub const fn bits(&self) -> u16 {
        Self::FIXED_BITS
            | (self.averaging as u16) << 9
            | (self.bus_conversion_time as u16) << 6
            | (self.shunt_conversion_time as u16) << 3
            | self.mode as u16
    }
}

/// 16 averages and 1.1 ms conversions on both channels, measuring continuously: `0x4527`.
impl Default for Configuration {
    fn default() -> Self {
        Self {
            averaging: Averaging::Avg16,
            bus_conversion_time: ConversionTime::Us1100,
            shunt_conversion_time: ConversionTime::Us1100,
            mode: OperatingMode::ShuntAndBusContinuous,
        }
    }
}

impl From<Configuration> for u16 {
    fn from(config: Configuration) -> u16 {
        config.bits()
    }
}
