use crate::error::{self, Bme680Error, Parameter};
use crate::{regs, Celsius, Milliseconds};

/// Highest heater plate temperature the sensor is specified for.
pub const MAX_HEATER_TEMP: Celsius = Celsius(400);
/// Longest heating phase accepted by [`HeaterProfile`].
pub const MAX_HEATER_DURATION: Milliseconds = Milliseconds(4095);

/// Oversampling settings for Temperature, Pressure, and Humidity.
///
/// Higher oversampling rates reduce noise by averaging in hardware, but lengthen
/// every measurement cycle and raise the energy spent per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement performed. Used to disable a specific channel.
    Skipped = 0,
    /// 1x Oversampling.
    #[default]
    X1 = 1,
    /// 2x Oversampling.
    X2 = 2,
    /// 4x Oversampling.
    X4 = 3,
    /// 8x Oversampling.
    X8 = 4,
    /// 16x Oversampling. Maximum precision, longest conversion.
    X16 = 5,
}

impl Oversampling {
    /// Decodes the 3-bit register field. Codes 6 and 7 also mean 16x on the sensor.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x07 {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            _ => Oversampling::X16,
        }
    }

    /// Maps a sample count (0, 1, 2, 4, 8 or 16) to a setting.
    pub fn from_samples(samples: u8) -> Option<Self> {
        match samples {
            0 => Some(Oversampling::Skipped),
            1 => Some(Oversampling::X1),
            2 => Some(Oversampling::X2),
            4 => Some(Oversampling::X4),
            8 => Some(Oversampling::X8),
            16 => Some(Oversampling::X16),
            _ => None,
        }
    }

    /// Number of ADC conversions averaged; also the number of measurement cycles spent.
    pub fn samples(self) -> u8 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// Grouped oversampling configuration for the three environmental channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OversamplingConfig {
    /// Temperature oversampling.
    pub temp_osrs: Oversampling,
    /// Humidity oversampling.
    pub hum_osrs: Oversampling,
    /// Pressure oversampling.
    pub pres_osrs: Oversampling,
}

impl Default for OversamplingConfig {
    fn default() -> Self {
        OversamplingConfig {
            temp_osrs: Oversampling::X8,
            hum_osrs: Oversampling::X2,
            pres_osrs: Oversampling::X4,
        }
    }
}

impl OversamplingConfig {
    /// Sum of measurement cycles over all channels, input to the timing model.
    pub fn meas_cycles(&self) -> u32 {
        self.temp_osrs.samples() as u32
            + self.pres_osrs.samples() as u32
            + self.hum_osrs.samples() as u32
    }
}

/// Infinite Impulse Response (IIR) filter coefficient.
///
/// Smooths short-term disturbances (slamming doors, drafts) in pressure and temperature.
/// Does not affect humidity or gas measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum IIRFilter {
    /// Filter off.
    #[default]
    IIR0 = 0,
    IIR1 = 1,
    IIR3 = 2,
    IIR7 = 3,
    IIR15 = 4,
    IIR31 = 5,
    IIR63 = 6,
    IIR127 = 7,
}

impl IIRFilter {
    /// Decodes the 3-bit register field.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x07 {
            0 => IIRFilter::IIR0,
            1 => IIRFilter::IIR1,
            2 => IIRFilter::IIR3,
            3 => IIRFilter::IIR7,
            4 => IIRFilter::IIR15,
            5 => IIRFilter::IIR31,
            6 => IIRFilter::IIR63,
            _ => IIRFilter::IIR127,
        }
    }

    /// Maps a filter size in samples (0 for off, then 2, 4, ... 128) to a coefficient.
    pub fn from_samples(samples: u8) -> Option<Self> {
        match samples {
            0 => Some(IIRFilter::IIR0),
            2 => Some(IIRFilter::IIR1),
            4 => Some(IIRFilter::IIR3),
            8 => Some(IIRFilter::IIR7),
            16 => Some(IIRFilter::IIR15),
            32 => Some(IIRFilter::IIR31),
            64 => Some(IIRFilter::IIR63),
            128 => Some(IIRFilter::IIR127),
            _ => None,
        }
    }
}

/// Operating mode written to the `mode` bits of `ctrl_meas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mode {
    /// No conversions, lowest power. The sensor falls back to this after every forced cycle.
    #[default]
    Sleep = 0,
    /// Single TPHG cycle, then back to sleep.
    Forced = 1,
}

impl Mode {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & regs::MODE_MSK {
            0 => Some(Mode::Sleep),
            1 => Some(Mode::Forced),
            _ => None,
        }
    }
}

/// Gas sensor hot-plate set-point, stored in heater profile slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaterProfile {
    /// Target temperature of the hot plate (typically 200 °C to 400 °C).
    pub target_temp: Celsius,
    /// How long the target is held before the gas conversion.
    pub duration: Milliseconds,
}

impl Default for HeaterProfile {
    fn default() -> Self {
        HeaterProfile {
            target_temp: Celsius(300),
            duration: Milliseconds(100),
        }
    }
}

/// Complete sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Oversampling settings for T, P and H.
    pub osrs_config: OversamplingConfig,
    /// IIR filter for noise suppression.
    pub iir_filter: IIRFilter,
    /// Gas heater profile. `None` switches the heater and gas conversions off (saves ~12mA).
    pub heater: Option<HeaterProfile>,
    /// Estimate of the ambient temperature, used for the heater resistance set-point.
    pub ambient_temp: Celsius,
    /// Mode the sensor is left in between readings.
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            osrs_config: OversamplingConfig::default(),
            iir_filter: IIRFilter::IIR0,
            heater: Some(HeaterProfile::default()),
            ambient_temp: Celsius(25),
            mode: Mode::Sleep,
        }
    }
}

fn invalid<E>(parameter: Parameter, value: i32) -> Bme680Error<E> {
    Bme680Error::InvalidParameter {
        parameter,
        value: value.clamp(0, u16::MAX as i32) as u16,
    }
}

impl HeaterProfile {
    pub fn validate<E>(&self) -> error::Result<(), E> {
        if !(0..=MAX_HEATER_TEMP.0).contains(&self.target_temp.0) {
            return Err(invalid(Parameter::HeaterTemperature, self.target_temp.0));
        }
        if self.duration.0 > MAX_HEATER_DURATION.0 {
            return Err(invalid(
                Parameter::HeaterDuration,
                self.duration.0.min(u16::MAX as u32) as i32,
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Checks every field before anything is written to the sensor.
    pub fn validate<E>(&self) -> error::Result<(), E> {
        if !(-40..=85).contains(&self.ambient_temp.0) {
            return Err(invalid(Parameter::AmbientTemperature, self.ambient_temp.0));
        }
        if let Some(heater) = self.heater {
            heater.validate::<E>()?;
        }
        Ok(())
    }

    /// Checks if gas conversions are enabled.
    pub(crate) fn gas_enabled(&self) -> bool {
        self.heater.is_some()
    }
}

/// Values of the three registers holding oversampling, filter and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRegisters {
    /// `ctrl_hum` (0x72), bits 2:0.
    pub ctrl_hum: u8,
    /// `ctrl_meas` (0x74), bits 7:0.
    pub ctrl_meas: u8,
    /// `config` (0x75), bits 4:2.
    pub config: u8,
}

impl ConfigRegisters {
    /// Register image for `config`, with the mode bits set to sleep.
    pub fn encode(config: &Config) -> Self {
        let osrs = &config.osrs_config;
        ConfigRegisters {
            ctrl_hum: osrs.hum_osrs as u8 & regs::OSRS_H_MSK,
            ctrl_meas: ((osrs.temp_osrs as u8) << regs::OSRS_T_POS)
                | ((osrs.pres_osrs as u8) << regs::OSRS_P_POS)
                | Mode::Sleep as u8,
            config: (config.iir_filter as u8) << regs::FILTER_POS,
        }
    }

    /// Oversampling and filter settings held by the register image.
    pub fn decode(&self) -> (OversamplingConfig, IIRFilter) {
        let osrs = OversamplingConfig {
            temp_osrs: Oversampling::from_u8(
                (self.ctrl_meas & regs::OSRS_T_MSK) >> regs::OSRS_T_POS,
            ),
            pres_osrs: Oversampling::from_u8(
                (self.ctrl_meas & regs::OSRS_P_MSK) >> regs::OSRS_P_POS,
            ),
            hum_osrs: Oversampling::from_u8(self.ctrl_hum & regs::OSRS_H_MSK),
        };
        let filter = IIRFilter::from_u8((self.config & regs::FILTER_MSK) >> regs::FILTER_POS);
        (osrs, filter)
    }
}

/// Builder for a [`Config`], starting from [`Config::default`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature oversampling.
    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    /// Sets the humidity oversampling.
    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    /// Sets the pressure oversampling.
    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    /// Sets the IIR filter coefficient.
    pub fn iir_filter(mut self, filter: IIRFilter) -> Self {
        self.config.iir_filter = filter;
        self
    }

    /// Enables or disables the gas heater.
    pub fn heater(mut self, heater: Option<HeaterProfile>) -> Self {
        self.config.heater = heater;
        self
    }

    /// Sets the ambient temperature estimate used for the heater set-point.
    pub fn ambient_temp(mut self, temp: Celsius) -> Self {
        self.config.ambient_temp = temp;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
