//! Forced-mode measurement cycle: timing model, status polling and field-data decoding.

use embedded_hal::delay::DelayNs;

use crate::bus::{RegisterBus, RegisterBusExt};
use crate::calib::Variant;
use crate::clock::Timestamp;
use crate::error::{self, Bme680Error};
use crate::regs;
use crate::settings::{Config, Oversampling};

/// Sleep between two status polls.
pub const POLL_PERIOD_MS: u32 = 10;

/// Attempts at forcing the sensor back to sleep before giving up.
pub(crate) const SLEEP_ATTEMPTS: u8 = 5;

/// Vendor timing model, in microseconds.
const CYCLE_US: u32 = 1963;
const TPH_SWITCHING_US: u32 = 477 * 4;
const GAS_MEASUREMENT_US: u32 = 477 * 5;
const WAKE_UP_US: u32 = 1000;

/// Where a measurement is in its forced-mode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Forced mode was written; the sensor is leaving sleep.
    Triggered,
    /// Waiting for `new_data`.
    Converting,
    /// Field data has been read and is being compensated.
    Ready,
}

/// Uncompensated gas conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGas {
    /// 10-bit ADC value.
    pub adc: u16,
    /// Range index chosen by the sensor, 0..=15.
    pub range: u8,
    /// `gas_valid`: a real conversion took place.
    pub valid: bool,
    /// `heat_stab`: the hot plate reached its target before the conversion.
    pub heater_stable: bool,
}

/// Raw ADC output of one measurement cycle.
///
/// Channels whose conversion was disabled are `None`; the sensor would report a
/// placeholder (`0x80000`) for them. Pressure and humidity are also `None` when temperature
/// is skipped, since they cannot be compensated without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawData {
    pub temp_adc: Option<u32>,
    pub pres_adc: Option<u32>,
    pub hum_adc: Option<u16>,
    pub gas: Option<RawGas>,
    /// When the field data was read.
    pub timestamp: Timestamp,
}

impl RawData {
    /// Decodes the field-data block starting at `0x1D`.
    pub fn parse(
        buf: &[u8; regs::FIELD_LENGTH],
        variant: Variant,
        config: &Config,
        timestamp: Timestamp,
    ) -> Self {
        let pres_adc = ((buf[2] as u32) << 12) | ((buf[3] as u32) << 4) | ((buf[4] as u32) >> 4);
        let temp_adc = ((buf[5] as u32) << 12) | ((buf[6] as u32) << 4) | ((buf[7] as u32) >> 4);
        let hum_adc = ((buf[8] as u16) << 8) | buf[9] as u16;

        // BME688 reports its gas result two registers further up
        let (msb, lsb) = match variant {
            Variant::Bme680 => (buf[13], buf[14]),
            Variant::Bme688 => (buf[15], buf[16]),
        };
        let gas = RawGas {
            adc: ((msb as u16) << 2) | (lsb >> 6) as u16,
            range: lsb & regs::GAS_RANGE_MSK,
            valid: lsb & regs::GAS_VALID_MSK != 0,
            heater_stable: lsb & regs::HEAT_STAB_MSK != 0,
        };

        let osrs = &config.osrs_config;
        let temp_enabled = osrs.temp_osrs != Oversampling::Skipped;
        RawData {
            temp_adc: temp_enabled.then_some(temp_adc),
            pres_adc: (temp_enabled && osrs.pres_osrs != Oversampling::Skipped).then_some(pres_adc),
            hum_adc: (temp_enabled && osrs.hum_osrs != Oversampling::Skipped).then_some(hum_adc),
            gas: config.gas_enabled().then_some(gas),
            timestamp,
        }
    }
}

/// Worst-case conversion time for `config`, rounded up to whole milliseconds, heater
/// duration included.
pub fn expected_duration_ms(config: &Config) -> u32 {
    let meas_us = config.osrs_config.meas_cycles() * CYCLE_US
        + TPH_SWITCHING_US
        + GAS_MEASUREMENT_US
        + WAKE_UP_US;
    let mut duration = meas_us / 1000 + 1;
    if let Some(heater) = config.heater {
        duration += heater.duration.0;
    }
    duration
}

/// How long to wait for `new_data` in total before giving up.
pub fn timeout_ms(expected_ms: u32) -> u32 {
    (2 * expected_ms).max(expected_ms + POLL_PERIOD_MS)
}

/// Waits out the conversion, then polls the status register until `new_data` is set.
///
/// Returns the field-data block. Elapsed time is the sum of the delays issued here.
pub(crate) fn poll_field_data<B: RegisterBus>(
    bus: &mut B,
    address: u8,
    delay: &mut impl DelayNs,
    expected_ms: u32,
) -> error::Result<[u8; regs::FIELD_LENGTH], B::Error> {
    let timeout = timeout_ms(expected_ms);
    delay.delay_ms(expected_ms);
    let mut elapsed = expected_ms;

    loop {
        let status = bus.read_reg_byte(address, regs::ADDR_FIELD_0)?;
        if status & regs::NEW_DATA_MSK != 0 {
            break;
        }
        if elapsed >= timeout {
            warn!("no new data after {} ms", elapsed);
            return Err(Bme680Error::MeasurementTimeout {
                elapsed_ms: elapsed,
            });
        }
        delay.delay_ms(POLL_PERIOD_MS);
        elapsed += POLL_PERIOD_MS;
    }
    trace!("new data after {} ms", elapsed);

    let mut buf = [0u8; regs::FIELD_LENGTH];
    bus.read_into(address, regs::ADDR_FIELD_0, &mut buf)?;
    Ok(buf)
}
