//! Error types for the BME680 driver.

use core::fmt;

/// Configuration field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parameter {
    TemperatureOversampling,
    PressureOversampling,
    HumidityOversampling,
    IirFilter,
    HeaterTemperature,
    HeaterDuration,
    AmbientTemperature,
}

/// Why a raw sample could not be turned into physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompensationError {
    /// The calibration coefficients produced a zero divisor.
    DivisionByZero,
    /// An intermediate value left the range the formula is defined for.
    Overflow,
}

/// Which self-test check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelfTestFailure {
    TemperatureOutOfRange,
    PressureOutOfRange,
    HumidityOutOfRange,
    /// The heater did not reach its target or the gas conversion was invalid.
    HeaterUnstable,
    /// Hot and cold plate resistances are too close to each other.
    GasResistanceRatio,
}

/// Errors that can occur during communication, configuration or measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bme680Error<E> {
    /// The bus transaction addressing `register` failed. Never retried by the driver.
    Bus { register: u8, source: E },
    /// Wrong device or wrong address: the chip-ID register did not read back as expected.
    ChipIdMismatch { expected: u8, actual: u8 },
    /// A configuration value is outside its legal set. Nothing was written to the sensor.
    InvalidParameter { parameter: Parameter, value: u16 },
    /// The sensor did not raise `new_data` within the timeout derived from the configuration.
    MeasurementTimeout { elapsed_ms: u32 },
    /// `open` was called on an instance that is already open.
    AlreadyOpen,
    /// The instance is closed.
    NotOpen,
    /// A previous bus failure or timeout left the sensor in an unknown state; re-open it.
    Faulted,
    /// The raw sample could not be compensated.
    Compensation(CompensationError),
    /// The mode bits held a value this driver does not drive the sensor into.
    UnknownMode(u8),
    /// The sensor answered but failed a plausibility check.
    SelfTestFailed(SelfTestFailure),
}

impl<E> Bme680Error<E> {
    /// Errors after which the sensor state is unknown and the instance must be re-opened.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Bme680Error::Bus { .. } | Bme680Error::MeasurementTimeout { .. }
        )
    }
}

impl<E> From<CompensationError> for Bme680Error<E> {
    fn from(e: CompensationError) -> Self {
        Bme680Error::Compensation(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Bme680Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bme680Error::Bus { register, source } => {
                write!(f, "bus error at register {register:#04x}: {source:?}")
            }
            Bme680Error::ChipIdMismatch { expected, actual } => write!(
                f,
                "chip id mismatch: expected {expected:#04x}, read {actual:#04x}"
            ),
            Bme680Error::InvalidParameter { parameter, value } => {
                write!(f, "invalid value {value} for {parameter:?}")
            }
            Bme680Error::MeasurementTimeout { elapsed_ms } => {
                write!(f, "no new data after {elapsed_ms} ms")
            }
            Bme680Error::AlreadyOpen => f.write_str("sensor is already open"),
            Bme680Error::NotOpen => f.write_str("sensor is not open"),
            Bme680Error::Faulted => f.write_str("sensor is faulted, re-open it"),
            Bme680Error::Compensation(e) => write!(f, "compensation failed: {e:?}"),
            Bme680Error::UnknownMode(bits) => write!(f, "unknown mode bits {bits:#04b}"),
            Bme680Error::SelfTestFailed(check) => write!(f, "self-test failed: {check:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Bme680Error<E> {}

/// Result type alias for BME680 operations.
pub type Result<T, E> = core::result::Result<T, Bme680Error<E>>;
