//! Compensation pipeline: raw ADC counts to physical units.
//!
//! Everything here is a pure function of a [`RawData`] sample and the chip's [`CalibData`].
//! The formulas are the vendor's integer reference formulas. Intermediates are widened so that
//! no coefficient/ADC combination can overflow; where the formula itself breaks down an
//! explicit [`CompensationError`] is returned.

use crate::calib::{CalibData, Variant};
use crate::error::CompensationError;
use crate::measure::{RawData, RawGas};
use crate::regs::GAS_RANGE_MSK;
use crate::{Celsius, Gas, GasReading, Humidity, Milliseconds, Pressure, Reading, Temperature};

/// Lookup tables for the gas resistance calculation, from the vendor reference API.
mod gas_constants {
    /// Per-range correction for the low-range (BME680) formula.
    pub static ARRAY1_INT: [u32; 16] = [
        2147483647, 2147483647, 2147483647, 2147483647, 2147483647, 2126008810, 2147483647,
        2130303777, 2147483647, 2147483647, 2143188679, 2136746228, 2147483647, 2126008810,
        2147483647, 2147483647,
    ];
    /// Range scaling from ADC counts to Ohm for the low-range formula.
    pub static ARRAY2_INT: [u32; 16] = [
        4096000000, 2048000000, 1024000000, 512000000, 255744255, 127110228, 64000000, 32258064,
        16016016, 8000000, 4000000, 2000000, 1000000, 500000, 250000, 125000,
    ];
}

const ADC_20_BIT: u32 = 0xF_FFFF;
const ADC_10_BIT: u16 = 0x3FF;
const HUMIDITY_MAX: i128 = 100_000;

/// Intermediate temperature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalcTempData {
    /// Fine-resolution temperature shared with the pressure and humidity formulas.
    pub temp_fine: i32,
    /// Temperature in centi-degrees Celsius.
    pub temp_comp: i32,
}

impl CalibData {
    /// Compensates the 20-bit temperature ADC value.
    ///
    /// Always runs first: `temp_fine` feeds pressure and humidity compensation.
    pub fn calc_temp(&self, temp_adc: u32) -> CalcTempData {
        let adc = (temp_adc & ADC_20_BIT) as i64;
        let var1 = (adc >> 3) - ((self.par_t1 as i64) << 1);
        let var2 = (var1 * self.par_t2 as i64) >> 11;
        let var3 = ((((var1 >> 1) * (var1 >> 1)) >> 12) * ((self.par_t3 as i64) << 4)) >> 14;
        // |var2 + var3| < 2^22 for a 20-bit ADC and any coefficients
        let temp_fine = (var2 + var3) as i32;

        CalcTempData {
            temp_fine,
            temp_comp: ((temp_fine * 5) + 128) >> 8,
        }
    }

    /// Compensates the 20-bit pressure ADC value into Pascal.
    ///
    /// # Errors
    /// [`CompensationError::DivisionByZero`] when the pressure coefficients cancel out the
    /// divisor, [`CompensationError::Overflow`] when the intermediate pressure leaves the
    /// 32-bit range of the reference formula or comes out negative.
    pub fn calc_pres(&self, temp_fine: i32, pres_adc: u32) -> Result<u32, CompensationError> {
        let t_fine = temp_fine as i64;
        let mut var1 = (t_fine >> 1) - 64_000;
        let mut var2 = ((((var1 >> 2) * (var1 >> 2)) >> 11) * self.par_p6 as i64) >> 2;
        var2 += (var1 * self.par_p5 as i64) << 1;
        var2 = (var2 >> 2) + ((self.par_p4 as i64) << 16);
        var1 = (((((var1 >> 2) * (var1 >> 2)) >> 13) * ((self.par_p3 as i64) << 5)) >> 3)
            + ((self.par_p2 as i64 * var1) >> 1);
        var1 >>= 18;
        var1 = ((32_768 + var1) * self.par_p1 as i64) >> 15;

        if var1 == 0 {
            return Err(CompensationError::DivisionByZero);
        }

        let mut press = 1_048_576 - (pres_adc & ADC_20_BIT) as i64;
        press = (press - (var2 >> 12)) * 3125;
        press = if press >= (1 << 30) {
            (press / var1) << 1
        } else {
            (press << 1) / var1
        };
        if press < i32::MIN as i64 || press > i32::MAX as i64 {
            return Err(CompensationError::Overflow);
        }

        let var1 = (self.par_p9 as i64 * (((press >> 3) * (press >> 3)) >> 13)) >> 12;
        let var2 = ((press >> 2) * self.par_p8 as i64) >> 13;
        let cube = press >> 8;
        let var3 = cube
            .checked_mul(cube)
            .and_then(|v| v.checked_mul(cube))
            .and_then(|v| v.checked_mul(self.par_p10 as i64))
            .ok_or(CompensationError::Overflow)?
            >> 17;

        press += (var1 + var2 + var3 + ((self.par_p7 as i64) << 7)) >> 4;
        u32::try_from(press).map_err(|_| CompensationError::Overflow)
    }

    /// Compensates the 16-bit humidity ADC value into milli-percent relative humidity,
    /// clamped to 0..=100000.
    pub fn calc_hum(&self, temp_fine: i32, hum_adc: u16) -> u32 {
        let temp_scaled = ((temp_fine as i64 * 5) + 128) >> 8;
        let var1 = hum_adc as i64
            - ((self.par_h1 as i64) << 4)
            - (((temp_scaled * self.par_h3 as i64) / 100) >> 1);
        let var2 = (self.par_h2 as i64
            * (((temp_scaled * self.par_h4 as i64) / 100)
                + (((temp_scaled * ((temp_scaled * self.par_h5 as i64) / 100)) >> 6) / 100)
                + (1 << 14)))
            >> 10;
        let var4 = (((self.par_h6 as i64) << 7) + ((temp_scaled * self.par_h7 as i64) / 100)) >> 4;

        // the quadratic term needs more than 64 bits for extreme coefficients
        let var3 = var1 as i128 * var2 as i128;
        let var5 = ((var3 >> 14) * (var3 >> 14)) >> 10;
        let var6 = (var4 as i128 * var5) >> 1;
        let hum = (((var3 + var6) >> 10) * 1000) >> 12;

        hum.clamp(0, HUMIDITY_MAX) as u32
    }

    /// Gas resistance in Ohm for the low-range gas sensor (BME680).
    pub fn calc_gas_low(&self, gas_adc: u16, gas_range: u8) -> Result<u32, CompensationError> {
        let range = (gas_range & GAS_RANGE_MSK) as usize;
        let var1 = ((1340 + 5 * self.range_sw_err as i64)
            * gas_constants::ARRAY1_INT[range] as i64)
            >> 16;
        let var2 = (((gas_adc & ADC_10_BIT) as i64) << 15) - (1 << 24) + var1;
        if var2 <= 0 {
            return Err(CompensationError::DivisionByZero);
        }
        let var3 = (gas_constants::ARRAY2_INT[range] as i64 * var1) >> 9;

        u32::try_from((var3 + (var2 >> 1)) / var2).map_err(|_| CompensationError::Overflow)
    }

    /// Gas resistance in Ohm for the high-range gas sensor (BME688).
    pub fn calc_gas_high(&self, gas_adc: u16, gas_range: u8) -> u32 {
        let var1 = 262_144u32 >> (gas_range & GAS_RANGE_MSK);
        // 10-bit ADC: var2 stays within 2560..=5629
        let var2 = ((gas_adc & ADC_10_BIT) as i32 - 512) * 3 + 4096;
        ((10_000 * var1) / var2 as u32) * 100
    }

    /// Register value for `res_heat_x` that makes the hot plate reach `target`
    /// at the given ambient temperature.
    pub fn calc_res_heat(&self, target: Celsius, ambient: Celsius) -> u8 {
        let target = target.0.clamp(0, crate::settings::MAX_HEATER_TEMP.0) as i64;
        let ambient = ambient.0 as i64;

        let var1 = ((ambient * self.par_g3 as i64) / 1000) * 256;
        let var2 = (self.par_g1 as i64 + 784)
            * (((((self.par_g2 as i64 + 154_009) * target * 5) / 100) + 3_276_800) / 10);
        let var3 = var1 + (var2 / 2);
        let var4 = var3 / (self.res_heat_range as i64 + 4);
        let var5 = 131 * self.res_heat_val as i64 + 65_536;
        let res_heat_x100 = ((var4 / var5) - 250) * 34;

        ((res_heat_x100 + 50) / 100).clamp(0, u8::MAX as i64) as u8
    }
}

/// Encodes a heating duration for `gas_wait_x`: 6-bit mantissa, 2-bit x4 multiplier.
///
/// Durations of 4032 ms and above saturate at `0xFF`.
pub fn calc_gas_wait(duration: Milliseconds) -> u8 {
    let mut dur = duration.0;
    if dur >= 0xFC0 {
        return 0xFF;
    }
    let mut factor = 0u8;
    while dur > 0x3F {
        dur /= 4;
        factor += 1;
    }
    dur as u8 + factor * 64
}

fn compensate_gas(calib: &CalibData, gas: &RawGas) -> Result<GasReading, CompensationError> {
    let resistance = match calib.variant {
        Variant::Bme680 => calib.calc_gas_low(gas.adc, gas.range)?,
        Variant::Bme688 => calib.calc_gas_high(gas.adc, gas.range),
    };
    Ok(GasReading {
        resistance: Gas(resistance),
        heater_stable: gas.heater_stable,
        valid: gas.valid,
    })
}

/// Turns one raw sample into a [`Reading`].
///
/// Temperature is compensated first; pressure and humidity use its fine value, so they are
/// `None` whenever temperature is. Channels that were not converted (`None` in `raw`) stay
/// `None`. Deterministic: the same inputs always give the same reading.
pub fn compensate(raw: &RawData, calib: &CalibData) -> Result<Reading, CompensationError> {
    let t = raw.temp_adc.map(|adc| calib.calc_temp(adc));

    let pressure = t
        .zip(raw.pres_adc)
        .map(|(t, adc)| calib.calc_pres(t.temp_fine, adc).map(Pressure))
        .transpose()?;
    let humidity = t
        .zip(raw.hum_adc)
        .map(|(t, adc)| Humidity(calib.calc_hum(t.temp_fine, adc)));
    let gas = raw
        .gas
        .as_ref()
        .map(|gas| compensate_gas(calib, gas))
        .transpose()?;

    Ok(Reading {
        temperature: t.map(|t| Temperature(t.temp_comp)),
        pressure,
        humidity,
        gas,
        timestamp: raw.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::tests::reference_calib;
    use crate::clock::Timestamp;
    use float_cmp::approx_eq;

    const RAW_T: u32 = 617_472;
    const RAW_P: u32 = 326_759;
    const RAW_H: u16 = 18_345;

    fn reference_raw() -> RawData {
        RawData {
            temp_adc: Some(RAW_T),
            pres_adc: Some(RAW_P),
            hum_adc: Some(RAW_H),
            gas: Some(RawGas {
                adc: 512,
                range: 5,
                valid: true,
                heater_stable: true,
            }),
            timestamp: Timestamp(42),
        }
    }

    #[test]
    fn reference_vector() {
        let calib = reference_calib();
        let t = calib.calc_temp(RAW_T);
        assert_eq!(t.temp_fine, 128_029);
        assert_eq!(t.temp_comp, 2501);

        let reading = compensate(&reference_raw(), &calib).unwrap();
        assert_eq!(reading.temperature, Some(Temperature(2501)));
        assert_eq!(reading.pressure, Some(Pressure(103_581)));
        assert_eq!(reading.humidity, Some(Humidity(30_814)));
        assert_eq!(reading.timestamp, Timestamp(42));

        // floating-point form of the same formulas
        assert!(approx_eq!(f32, reading.temperature.unwrap().celsius(), 25.006, epsilon = 0.01));
        assert!(approx_eq!(f32, reading.pressure.unwrap().hpa(), 1035.832, epsilon = 0.03));
        assert!(approx_eq!(f32, reading.humidity.unwrap().percent(), 30.822, epsilon = 0.02));
    }

    #[test]
    fn compensation_is_deterministic() {
        let calib = reference_calib();
        let raw = reference_raw();
        let first = compensate(&raw, &calib);
        for _ in 0..3 {
            assert_eq!(compensate(&raw, &calib), first);
        }
    }

    #[test]
    fn skipped_channels_stay_empty() {
        let raw = RawData {
            pres_adc: None,
            hum_adc: None,
            gas: None,
            ..reference_raw()
        };
        let reading = compensate(&raw, &reference_calib()).unwrap();
        assert_eq!(reading.temperature, Some(Temperature(2501)));
        assert_eq!(reading.pressure, None);
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.gas, None);
    }

    #[test]
    fn skipped_temperature_drops_pressure_and_humidity() {
        let raw = RawData {
            temp_adc: None,
            ..reference_raw()
        };
        let reading = compensate(&raw, &reference_calib()).unwrap();
        assert_eq!(reading.temperature, None);
        assert_eq!(reading.pressure, None);
        assert_eq!(reading.humidity, None);
        // gas does not depend on the temperature channel
        assert_eq!(reading.gas.map(|g| g.resistance), Some(Gas(248_262)));
    }

    #[test]
    fn humidity_is_clamped() {
        let calib = reference_calib();
        let t = calib.calc_temp(RAW_T);
        assert_eq!(calib.calc_hum(t.temp_fine, 0), 0);
        assert_eq!(calib.calc_hum(t.temp_fine, u16::MAX), 100_000);

        let extremes = [
            (0u16, 4095u16, i8::MIN, i8::MAX, i8::MIN, u8::MAX, i8::MAX),
            (4095, 0, i8::MAX, i8::MIN, i8::MAX, 0, i8::MIN),
            (4095, 4095, i8::MAX, i8::MAX, i8::MAX, u8::MAX, i8::MAX),
            (0, 4095, i8::MIN, i8::MIN, i8::MIN, 0, i8::MIN),
        ];
        for (h1, h2, h3, h4, h5, h6, h7) in extremes {
            let calib = CalibData {
                par_h1: h1,
                par_h2: h2,
                par_h3: h3,
                par_h4: h4,
                par_h5: h5,
                par_h6: h6,
                par_h7: h7,
                ..reference_calib()
            };
            for temp_adc in [0, RAW_T, ADC_20_BIT] {
                let t_fine = calib.calc_temp(temp_adc).temp_fine;
                for hum_adc in [0, RAW_H, u16::MAX] {
                    assert!(calib.calc_hum(t_fine, hum_adc) <= 100_000);
                }
            }
        }
    }

    #[test]
    fn zero_pressure_divisor_is_an_error() {
        let calib = CalibData {
            par_p1: 0,
            ..reference_calib()
        };
        assert_eq!(
            calib.calc_pres(128_029, RAW_P),
            Err(CompensationError::DivisionByZero)
        );
        let raw = reference_raw();
        assert_eq!(
            compensate(&raw, &calib),
            Err(CompensationError::DivisionByZero)
        );
    }

    #[test]
    fn pressure_overflow_is_an_error() {
        let t_fine = reference_calib().calc_temp(RAW_T).temp_fine;

        // divisor of 1: the intermediate pressure leaves the i32 range
        let calib = CalibData {
            par_p1: 2,
            ..reference_calib()
        };
        assert_eq!(
            calib.calc_pres(t_fine, RAW_P),
            Err(CompensationError::Overflow)
        );

        // fits in i32, but the cubic term does not fit in i64
        let calib = CalibData {
            par_p1: 3,
            ..reference_calib()
        };
        assert_eq!(
            calib.calc_pres(t_fine, RAW_P),
            Err(CompensationError::Overflow)
        );

        // full-scale ADC on the reference calibration comes out negative
        assert_eq!(
            reference_calib().calc_pres(t_fine, ADC_20_BIT),
            Err(CompensationError::Overflow)
        );
        let raw = RawData {
            pres_adc: Some(ADC_20_BIT),
            ..reference_raw()
        };
        assert_eq!(
            compensate(&raw, &reference_calib()),
            Err(CompensationError::Overflow)
        );
    }

    #[test]
    fn pressure_is_a_value_or_an_error_on_extreme_coefficients() {
        let mut values = 0;
        let mut overflows = 0;
        let i16s = [i16::MIN, -1, 0, 1, i16::MAX];
        let i8s = [i8::MIN, 0, i8::MAX];
        for p1 in [0u16, 1, u16::MAX] {
            for p2 in i16s {
                for p4 in i16s {
                    for p9 in i16s {
                        for p3 in i8s {
                            let calib = CalibData {
                                par_p1: p1,
                                par_p2: p2,
                                par_p3: p3,
                                par_p4: p4,
                                par_p5: i16::MAX,
                                par_p6: i8::MIN,
                                par_p8: i16::MIN,
                                par_p9: p9,
                                par_p10: u8::MAX,
                                ..reference_calib()
                            };
                            for temp_adc in [0, RAW_T, ADC_20_BIT] {
                                let t_fine = calib.calc_temp(temp_adc).temp_fine;
                                for pres_adc in [0, RAW_P, ADC_20_BIT] {
                                    match calib.calc_pres(t_fine, pres_adc) {
                                        Ok(_) => values += 1,
                                        Err(CompensationError::Overflow) => overflows += 1,
                                        Err(CompensationError::DivisionByZero) => {
                                            assert_ne!(p1, u16::MAX);
                                            continue;
                                        }
                                    }
                                    // a zero p1 always zeroes the divisor
                                    assert_ne!(p1, 0);
                                }
                            }
                        }
                    }
                }
            }
        }
        assert!(values > 0);
        assert!(overflows > 0);
    }

    #[test]
    fn low_range_gas() {
        let calib = reference_calib();
        assert_eq!(calib.calc_gas_low(512, 5), Ok(248_262));
        assert_eq!(calib.calc_gas_low(700, 4), Ok(438_044));

        let calib = CalibData {
            range_sw_err: -2,
            ..calib
        };
        assert_eq!(calib.calc_gas_low(700, 4), Ok(437_639));
    }

    #[test]
    fn high_range_gas() {
        let calib = CalibData {
            variant: Variant::Bme688,
            ..reference_calib()
        };
        assert_eq!(calib.calc_gas_high(512, 5), 2_000_000);
        assert_eq!(calib.calc_gas_high(700, 4), 3_515_800);

        let reading = compensate(&reference_raw(), &calib).unwrap();
        assert_eq!(reading.gas.unwrap().resistance, Gas(2_000_000));
    }

    #[test]
    fn gas_range_index_is_masked() {
        let calib = reference_calib();
        assert_eq!(calib.calc_gas_low(512, 0xF5), calib.calc_gas_low(512, 5));
        assert_eq!(calib.calc_gas_high(512, 0x25), calib.calc_gas_high(512, 5));
    }

    #[test]
    fn unstable_heater_is_reported_not_dropped() {
        let raw = RawData {
            gas: Some(RawGas {
                adc: 512,
                range: 5,
                valid: true,
                heater_stable: false,
            }),
            ..reference_raw()
        };
        let gas = compensate(&raw, &reference_calib()).unwrap().gas.unwrap();
        assert_eq!(gas.resistance, Gas(248_262));
        assert!(gas.low_confidence());
    }

    #[test]
    fn heater_resistance_set_point() {
        let calib = reference_calib();
        let ambient = Celsius(25);
        assert_eq!(calib.calc_res_heat(Celsius(300), ambient), 112);
        assert_eq!(calib.calc_res_heat(Celsius(320), ambient), 117);
        assert_eq!(calib.calc_res_heat(Celsius(350), ambient), 125);
        assert_eq!(calib.calc_res_heat(Celsius(150), ambient), 72);
        assert_eq!(calib.calc_res_heat(Celsius(400), ambient), 139);
        assert_eq!(calib.calc_res_heat(Celsius(0), ambient), 32);
        // clamped to the plate limit
        assert_eq!(calib.calc_res_heat(Celsius(500), ambient), 139);
    }

    #[test]
    fn heater_duration_encoding() {
        assert_eq!(calc_gas_wait(Milliseconds(0)), 0);
        assert_eq!(calc_gas_wait(Milliseconds(63)), 63);
        assert_eq!(calc_gas_wait(Milliseconds(100)), 0x59);
        assert_eq!(calc_gas_wait(Milliseconds(150)), 101);
        assert_eq!(calc_gas_wait(Milliseconds(1000)), 190);
        assert_eq!(calc_gas_wait(Milliseconds(4031)), 254);
        assert_eq!(calc_gas_wait(Milliseconds(4032)), 0xFF);
        assert_eq!(calc_gas_wait(Milliseconds(4095)), 0xFF);
    }
}
