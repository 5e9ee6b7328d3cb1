#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # BME680 / BME688 Environmental Sensor Driver Core
//!
//! A `no_std` driver for the Bosch BME680 and BME688, built on `embedded-hal` 1.0.
//!
//! The driver owns the bus for its whole life and tracks the sensor's lifecycle at runtime:
//! [`Bme680::open`] resets the chip and loads its calibration, [`Bme680::read_data`] runs
//! one forced-mode cycle and [`Bme680::close`] lets go of the device again. A bus failure or
//! a timed-out measurement leaves the instance [`State::Faulted`] until it is re-opened.
//!
//! ## Features
//! - **Configurable channels**: skip pressure, humidity or the gas heater individually.
//! - **Fixed-Point Arithmetic**: No FPU required. Compensation is a pure function
//!   ([`calc::compensate`]) and can be tested without hardware.
//! - **Pseudo-IAQ**: a swappable, non-authoritative air-quality heuristic ([`iaq`]).
//!
//! ## Units
//! - **Temperature**: Centigrade (C * 100) -> 2350 = 23.50 °C
//! - **Humidity**: Milli-percent (RH % * 1000) -> 45123 = 45.123 %
//! - **Pressure**: Pascal (Pa) -> 101325 = 1013.25 hPa
//! - **Gas Resistance**: Ohms (Ω)
//!
//! ## Cargo features
//! - `std`: [`SystemClock`] for wall-clock timestamps.
//! - `defmt` / `log`: driver logging through either framework (mutually exclusive).
//! - `serde`: `Serialize`/`Deserialize` for configuration and readings.

// must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod bus;
pub mod calc;
pub mod calib;
pub mod clock;
pub mod error;
pub mod iaq;
pub mod measure;
mod regs;
pub mod settings;

use embedded_hal::delay::DelayNs;

pub use bus::RegisterBus;
pub use calc::compensate;
pub use calib::{CalibData, Variant};
#[cfg(feature = "std")]
pub use clock::SystemClock;
pub use clock::{Clock, NoClock, Timestamp};
pub use error::{Bme680Error, CompensationError, Parameter, SelfTestFailure};
pub use iaq::{IaqEstimator, IaqScore, LogRatioIaq};
pub use measure::{Phase, RawData, RawGas};
pub use settings::{
    Config, ConfigBuilder, HeaterProfile, IIRFilter, Mode, Oversampling, OversamplingConfig,
};

use bus::RegisterBusExt;
use settings::ConfigRegisters;

/// Default 7-bit address (SDO pulled high).
pub const DEFAULT_ADDRESS: u8 = 0x77;
/// Secondary 7-bit address (SDO pulled low).
pub const SECONDARY_ADDRESS: u8 = 0x76;

/// Temperature in whole degrees Celsius, used for heater and ambient settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Celsius(pub i32);

/// Duration wrapper for type-safety. Stored in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Milliseconds(pub u32);

/// Represents temperature in Centigrade (degrees Celsius * 100).
///
/// # Example
/// A value of `2350` represents **23.50 °C**.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Temperature(pub i32);

impl Temperature {
    /// Splits the fixed-point value into integral (degrees) and fractional (decimals) parts.
    ///
    /// # Example
    /// ```rust
    /// use bme680_core::Temperature;
    /// let temp = Temperature(2350);
    /// assert_eq!(temp.split(), (23, 50)); // Represents 23.50 °C
    /// ```
    pub fn split(&self) -> (i32, i32) {
        (self.0 / 100, self.0 % 100)
    }

    /// Temperature in degrees Celsius as a float.
    pub fn celsius(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

/// Represents relative humidity in milli-percent (percent * 1000), always 0..=100000.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Humidity(pub u32);

impl Humidity {
    /// Splits the fixed-point value into integral and fractional parts.
    /// The fraction represents 3 decimal places.
    ///
    /// ```rust
    /// use bme680_core::Humidity;
    /// let hum = Humidity(45123);
    /// assert_eq!(hum.split(), (45, 123)); // Represents 45.123 %
    /// ```
    pub fn split(&self) -> (u32, u32) {
        (self.0 / 1000, self.0 % 1000)
    }

    /// Relative humidity in percent as a float.
    pub fn percent(&self) -> f32 {
        self.0 as f32 / 1000.0
    }
}

/// Represents atmospheric pressure in Pascal (Pa).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pressure(pub u32);

impl Pressure {
    /// Converts the Pascal value to Hectopascal (hPa) and splits it into parts.
    ///
    /// ```rust
    /// use bme680_core::Pressure;
    /// let press = Pressure(101325);
    /// assert_eq!(press.as_hpa(), (1013, 25)); // Represents 1013.25 hPa
    /// ```
    pub fn as_hpa(&self) -> (u32, u32) {
        (self.0 / 100, self.0 % 100)
    }

    /// Pressure in hectopascal as a float.
    pub fn hpa(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

/// Represents gas resistance in Ohms (Ω).
///
/// A higher gas resistance typically indicates cleaner air (fewer VOCs).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gas(pub u32);

/// Compensated gas conversion together with its status bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasReading {
    pub resistance: Gas,
    /// The hot plate reached its target temperature before the conversion.
    pub heater_stable: bool,
    /// The sensor flagged the conversion as valid.
    pub valid: bool,
}

impl GasReading {
    /// Advisory flag: the resistance is reported, but was taken with an unstable heater
    /// or without a valid conversion. Whether to use it is up to the caller.
    pub fn low_confidence(&self) -> bool {
        !(self.heater_stable && self.valid)
    }
}

/// Compensated measurement result in physical units.
///
/// Channels disabled in the [`Config`] are `None`. Skipping temperature also empties
/// pressure and humidity, which are compensated against it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub temperature: Option<Temperature>,
    pub pressure: Option<Pressure>,
    pub humidity: Option<Humidity>,
    pub gas: Option<GasReading>,
    /// Clock value when the field data was read.
    pub timestamp: Timestamp,
}

/// Lifecycle state of a [`Bme680`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    #[default]
    Closed,
    /// Calibrated and configured; the sensor sleeps between readings.
    Open,
    Measuring(Phase),
    /// A bus error or timeout left the sensor in an unknown state. Only `open` and
    /// `close` are accepted.
    Faulted,
}

/// Device bound by a successful `open`.
#[derive(Debug, Clone, Copy)]
struct Session {
    address: u8,
    calib: CalibData,
}

/// The main BME680 driver structure.
///
/// Owns the bus. Every operation takes `&mut self`, so one instance never interleaves
/// two bus sequences; several instances on different addresses are fully independent.
#[derive(Debug)]
pub struct Bme680<B, C = NoClock> {
    bus: B,
    clock: C,
    session: Option<Session>,
    config: Config,
    state: State,
}

impl<B> Bme680<B, NoClock>
where
    B: RegisterBus,
{
    /// Creates a closed driver instance. This does not communicate with the sensor yet.
    pub fn new(bus: B) -> Self {
        Bme680::with_clock(bus, NoClock)
    }
}

impl<B, C> Bme680<B, C>
where
    B: RegisterBus,
    C: Clock,
{
    /// Creates a closed driver instance that stamps readings with `clock`.
    pub fn with_clock(bus: B, clock: C) -> Self {
        Bme680 {
            bus,
            clock,
            session: None,
            config: Config::default(),
            state: State::Closed,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The configuration last applied to the sensor.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Calibration of the open sensor.
    pub fn calibration(&self) -> Option<&CalibData> {
        self.session.as_ref().map(|s| &s.calib)
    }

    /// Bus address of the open sensor.
    pub fn address(&self) -> Option<u8> {
        self.session.map(|s| s.address)
    }

    /// Binds the instance to the sensor at `address` and brings it into a known state.
    ///
    /// Verifies the chip id (before writing anything), soft-resets the sensor, verifies the
    /// chip id again, loads the calibration and applies [`Config::default`]. Also accepted
    /// on a faulted instance to recover it. On failure the instance stays closed.
    ///
    /// # Errors
    /// [`Bme680Error::AlreadyOpen`], [`Bme680Error::ChipIdMismatch`] or a bus error.
    pub fn open(&mut self, address: u8, delay: &mut impl DelayNs) -> error::Result<(), B::Error> {
        if matches!(self.state, State::Open | State::Measuring(_)) {
            return Err(Bme680Error::AlreadyOpen);
        }
        self.session = None;
        self.state = State::Closed;

        info!("opening sensor at {}", address);
        calib::check_chip_id(&mut self.bus, address)?;
        self.bus
            .write_reg(address, regs::ADDR_SOFT_RESET, regs::CMD_SOFT_RESET)?;
        delay.delay_ms(regs::RESET_PERIOD_MS);

        let calib = calib::load(&mut self.bus, address)?;
        let session = Session { address, calib };
        let config = Config::default();
        write_config(&mut self.bus, &session, &config)?;

        self.session = Some(session);
        self.config = config;
        self.state = State::Open;
        info!("sensor at {} open", address);
        Ok(())
    }

    /// Validates and applies a full configuration.
    ///
    /// Nothing is written if validation fails, and the previous configuration stays in
    /// effect. With `config.mode == Mode::Forced` a measurement is triggered right away and
    /// the next [`read_data`](Self::read_data) collects it.
    pub fn configure(&mut self, config: Config) -> error::Result<(), B::Error> {
        let session = self.session()?;
        config.validate::<B::Error>()?;

        let result = write_config(&mut self.bus, &session, &config);
        self.track(result)?;
        self.config = config;
        self.state = State::Open;

        if config.mode == Mode::Forced {
            let ctrl_meas = ConfigRegisters::encode(&config).ctrl_meas | Mode::Forced as u8;
            let result = self
                .bus
                .write_reg(session.address, regs::ADDR_CTRL_MEAS, ctrl_meas);
            self.track(result)?;
            self.state = State::Measuring(Phase::Triggered);
        }
        debug!(
            "configured: osrs_t={} osrs_p={} osrs_h={} filter={}",
            config.osrs_config.temp_osrs as u8,
            config.osrs_config.pres_osrs as u8,
            config.osrs_config.hum_osrs as u8,
            config.iir_filter as u8
        );
        Ok(())
    }

    /// Applies oversampling and filter settings given as raw sample counts.
    ///
    /// Oversampling accepts 0 (skip), 1, 2, 4, 8 or 16; the filter 0 (off), 2, 4, ... 128.
    /// Heater and ambient settings are kept.
    pub fn set_config(
        &mut self,
        os_t: u8,
        os_p: u8,
        os_h: u8,
        filter: u8,
    ) -> error::Result<(), B::Error> {
        let invalid = |parameter, value: u8| Bme680Error::<B::Error>::InvalidParameter {
            parameter,
            value: value as u16,
        };

        let temp_osrs = Oversampling::from_samples(os_t)
            .ok_or(invalid(Parameter::TemperatureOversampling, os_t))?;
        let pres_osrs = Oversampling::from_samples(os_p)
            .ok_or(invalid(Parameter::PressureOversampling, os_p))?;
        let hum_osrs = Oversampling::from_samples(os_h)
            .ok_or(invalid(Parameter::HumidityOversampling, os_h))?;
        let iir_filter =
            IIRFilter::from_samples(filter).ok_or(invalid(Parameter::IirFilter, filter))?;

        let config = Config {
            osrs_config: OversamplingConfig {
                temp_osrs,
                hum_osrs,
                pres_osrs,
            },
            iir_filter,
            mode: Mode::Sleep,
            ..self.config
        };
        self.configure(config)
    }

    /// Enables the gas heater with a new set-point.
    pub fn set_heater(
        &mut self,
        target_temp: Celsius,
        duration: Milliseconds,
    ) -> error::Result<(), B::Error> {
        let session = self.session()?;
        let profile = HeaterProfile {
            target_temp,
            duration,
        };
        profile.validate::<B::Error>()?;

        let result = write_heater(
            &mut self.bus,
            &session,
            Some(profile),
            self.config.ambient_temp,
        );
        self.track(result)?;
        self.config.heater = Some(profile);
        Ok(())
    }

    /// Switches the gas heater and gas conversions off.
    pub fn disable_heater(&mut self) -> error::Result<(), B::Error> {
        let session = self.session()?;
        let result = write_heater(&mut self.bus, &session, None, self.config.ambient_temp);
        self.track(result)?;
        self.config.heater = None;
        Ok(())
    }

    /// Updates the ambient estimate behind the heater set-point.
    ///
    /// Rewrites the set-point when the heater is enabled. Typically fed with the
    /// temperature of the previous reading.
    pub fn set_ambient_temperature(&mut self, ambient: Celsius) -> error::Result<(), B::Error> {
        let session = self.session()?;
        let config = Config {
            ambient_temp: ambient,
            ..self.config
        };
        config.validate::<B::Error>()?;

        if let Some(heater) = config.heater {
            let res_heat = session.calib.calc_res_heat(heater.target_temp, ambient);
            let result = self
                .bus
                .write_reg(session.address, regs::ADDR_RES_HEAT_0, res_heat);
            self.track(result)?;
        }
        self.config.ambient_temp = ambient;
        Ok(())
    }

    /// Puts the sensor to sleep or triggers a single forced-mode cycle.
    ///
    /// Setting [`Mode::Sleep`] abandons a pending measurement. After [`Mode::Forced`] the
    /// next [`read_data`](Self::read_data) collects the triggered cycle instead of starting
    /// a new one.
    pub fn set_mode(
        &mut self,
        mode: Mode,
        delay: &mut impl DelayNs,
    ) -> error::Result<(), B::Error> {
        let session = self.session()?;
        let result = write_mode(&mut self.bus, session.address, mode, delay);
        self.track(result)?;
        self.state = match mode {
            Mode::Sleep => State::Open,
            Mode::Forced => State::Measuring(Phase::Triggered),
        };
        Ok(())
    }

    /// Reads the operating mode back from the sensor.
    pub fn get_mode(&mut self) -> error::Result<Mode, B::Error> {
        let session = self.session()?;
        let result = self
            .bus
            .read_reg_byte(session.address, regs::ADDR_CTRL_MEAS);
        let bits = self.track(result)? & regs::MODE_MSK;
        Mode::from_bits(bits).ok_or(Bme680Error::UnknownMode(bits))
    }

    /// Runs one forced-mode cycle and returns the compensated reading.
    ///
    /// Blocks for the conversion time of the current configuration (heater duration
    /// included), polling every [`measure::POLL_PERIOD_MS`].
    ///
    /// # Errors
    /// - [`Bme680Error::Faulted`] without touching the bus if a previous call faulted.
    /// - [`Bme680Error::MeasurementTimeout`] if `new_data` never shows up; the instance is
    ///   faulted afterwards.
    /// - [`Bme680Error::Compensation`] if the raw sample cannot be converted.
    pub fn read_data(&mut self, delay: &mut impl DelayNs) -> error::Result<Reading, B::Error> {
        let session = self.session()?;

        if self.state != State::Measuring(Phase::Triggered) {
            let result = write_mode(&mut self.bus, session.address, Mode::Forced, delay);
            self.track(result)?;
            self.state = State::Measuring(Phase::Triggered);
        }

        self.state = State::Measuring(Phase::Converting);
        let expected = measure::expected_duration_ms(&self.config);
        let result = measure::poll_field_data(&mut self.bus, session.address, delay, expected);
        let buf = self.track(result)?;

        self.state = State::Measuring(Phase::Ready);
        let timestamp = Timestamp(self.clock.now_ms());
        let raw = RawData::parse(&buf, session.calib.variant, &self.config, timestamp);
        self.state = State::Open;

        let reading = calc::compensate(&raw, &session.calib)?;
        if reading.gas.is_some_and(|gas| gas.low_confidence()) {
            debug!("gas reading taken with unstable heater");
        }
        Ok(reading)
    }

    /// Pseudo-IAQ score of `gas` against a clean-air `baseline`, using [`LogRatioIaq`].
    ///
    /// Not a certified air-quality index. Use an [`IaqEstimator`] directly to swap the
    /// formula.
    pub fn estimate_iaq(&self, gas: Gas, baseline: Gas) -> IaqScore {
        LogRatioIaq::default().estimate(gas, baseline)
    }

    /// Plausibility check of all four channels, taking roughly two seconds.
    ///
    /// Measures once with the hot plate at 350 °C and once at 150 °C. Temperature, pressure
    /// and humidity must be in a room-climate range, both gas conversions valid and
    /// heater-stable, and the cold-plate resistance at least 1.2 times the hot-plate one.
    /// The previous configuration is restored afterwards.
    pub fn self_test(&mut self, delay: &mut impl DelayNs) -> error::Result<(), B::Error> {
        self.session()?;
        let saved = Config {
            mode: Mode::Sleep,
            ..self.config
        };

        let result = self.run_self_test(saved, delay);
        if self.state == State::Faulted {
            return result;
        }
        let restored = self.configure(saved);
        result.and(restored)
    }

    fn run_self_test(
        &mut self,
        saved: Config,
        delay: &mut impl DelayNs,
    ) -> error::Result<(), B::Error> {
        const HOT: Celsius = Celsius(350);
        const COLD: Celsius = Celsius(150);
        const HEAT_DURATION: Milliseconds = Milliseconds(1000);

        let fail = |check| Err(Bme680Error::SelfTestFailed(check));
        let profile = |target_temp| Config {
            heater: Some(HeaterProfile {
                target_temp,
                duration: HEAT_DURATION,
            }),
            ambient_temp: saved.ambient_temp,
            ..Config::default()
        };

        self.configure(profile(HOT))?;
        let reading = self.read_data(delay)?;
        if !reading
            .temperature
            .is_some_and(|t| (0..=6000).contains(&t.0))
        {
            return fail(SelfTestFailure::TemperatureOutOfRange);
        }
        if !reading
            .pressure
            .is_some_and(|p| (90_000..=110_000).contains(&p.0))
        {
            return fail(SelfTestFailure::PressureOutOfRange);
        }
        if !reading
            .humidity
            .is_some_and(|h| (20_000..=80_000).contains(&h.0))
        {
            return fail(SelfTestFailure::HumidityOutOfRange);
        }
        let hot = match reading.gas {
            Some(gas) if !gas.low_confidence() => gas.resistance,
            _ => return fail(SelfTestFailure::HeaterUnstable),
        };

        self.configure(profile(COLD))?;
        let cold = match self.read_data(delay)?.gas {
            Some(gas) if !gas.low_confidence() => gas.resistance,
            _ => return fail(SelfTestFailure::HeaterUnstable),
        };

        // cold >= 1.2 * hot
        if (cold.0 as u64) * 5 < (hot.0 as u64) * 6 {
            warn!("self-test gas ratio: hot {} cold {}", hot.0, cold.0);
            return fail(SelfTestFailure::GasResistanceRatio);
        }
        info!("self-test passed");
        Ok(())
    }

    /// Stops using the sensor. Idempotent.
    ///
    /// A measurement in flight is abandoned; the sensor finishes it on its own and goes
    /// back to sleep.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            info!("sensor at {} closed", session.address);
        }
        self.state = State::Closed;
    }

    /// Hands the bus back.
    pub fn release(self) -> B {
        self.bus
    }

    /// Session of an instance accepting sensor operations.
    fn session(&self) -> error::Result<Session, B::Error> {
        match (self.state, self.session) {
            (State::Faulted, _) => Err(Bme680Error::Faulted),
            (_, Some(session)) => Ok(session),
            (_, None) => Err(Bme680Error::NotOpen),
        }
    }

    /// Moves the instance to [`State::Faulted`] on errors that leave the sensor state unknown.
    fn track<T>(&mut self, result: error::Result<T, B::Error>) -> error::Result<T, B::Error> {
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("sensor faulted, re-open required");
                self.state = State::Faulted;
            }
        }
        result
    }
}

/// Writes oversampling, filter and heater settings. Leaves the sensor in sleep mode.
///
/// `ctrl_hum` goes first: the sensor only latches it on the following `ctrl_meas` write.
fn write_config<B: RegisterBus>(
    bus: &mut B,
    session: &Session,
    config: &Config,
) -> error::Result<(), B::Error> {
    let image = ConfigRegisters::encode(config);
    let address = session.address;

    bus.update_reg(address, regs::ADDR_CTRL_HUM, regs::OSRS_H_MSK, image.ctrl_hum)?;
    bus.update_reg(address, regs::ADDR_CONFIG, regs::FILTER_MSK, image.config)?;
    bus.write_reg(address, regs::ADDR_CTRL_MEAS, image.ctrl_meas)?;

    write_heater(bus, session, config.heater, config.ambient_temp)
}

/// Programs heater profile slot 0 and switches gas conversions on, or switches them off.
fn write_heater<B: RegisterBus>(
    bus: &mut B,
    session: &Session,
    heater: Option<HeaterProfile>,
    ambient: Celsius,
) -> error::Result<(), B::Error> {
    let address = session.address;
    match heater {
        Some(profile) => {
            let res_heat = session.calib.calc_res_heat(profile.target_temp, ambient);
            let gas_wait = calc::calc_gas_wait(profile.duration);
            debug!(
                "heater {} C for {} ms: res_heat={} gas_wait={}",
                profile.target_temp.0,
                profile.duration.0,
                res_heat,
                gas_wait
            );
            bus.write_reg(address, regs::ADDR_RES_HEAT_0, res_heat)?;
            bus.write_reg(address, regs::ADDR_GAS_WAIT_0, gas_wait)?;
            // run_gas for this variant, nb_conv = profile 0
            bus.update_reg(
                address,
                regs::ADDR_CTRL_GAS_1,
                regs::RUN_GAS_MSK | regs::NB_CONV_MSK,
                session.calib.variant.run_gas() << regs::RUN_GAS_POS,
            )?;
            bus.update_reg(address, regs::ADDR_CTRL_GAS_0, regs::HEAT_OFF_MSK, 0)
        }
        None => {
            debug!("heater off");
            bus.update_reg(address, regs::ADDR_CTRL_GAS_1, regs::RUN_GAS_MSK, 0)?;
            bus.update_reg(
                address,
                regs::ADDR_CTRL_GAS_0,
                regs::HEAT_OFF_MSK,
                regs::HEAT_OFF_MSK,
            )
        }
    }
}

/// Brings the sensor to sleep, then writes `mode` unless it is sleep.
///
/// The sensor ignores a mode change while a conversion is running, so sleep is requested
/// until it reads back, for at most [`measure::SLEEP_ATTEMPTS`] polls.
fn write_mode<B: RegisterBus>(
    bus: &mut B,
    address: u8,
    mode: Mode,
    delay: &mut impl DelayNs,
) -> error::Result<(), B::Error> {
    for _ in 0..measure::SLEEP_ATTEMPTS {
        let ctrl_meas = bus.read_reg_byte(address, regs::ADDR_CTRL_MEAS)?;
        let sleep = ctrl_meas & !regs::MODE_MSK;
        if ctrl_meas & regs::MODE_MSK == Mode::Sleep as u8 {
            if mode != Mode::Sleep {
                trace!("trigger mode {}", mode as u8);
                bus.write_reg(address, regs::ADDR_CTRL_MEAS, sleep | mode as u8)?;
            }
            return Ok(());
        }
        bus.write_reg(address, regs::ADDR_CTRL_MEAS, sleep)?;
        delay.delay_ms(measure::POLL_PERIOD_MS);
    }
    Err(Bme680Error::MeasurementTimeout {
        elapsed_ms: measure::SLEEP_ATTEMPTS as u32 * measure::POLL_PERIOD_MS,
    })
}
