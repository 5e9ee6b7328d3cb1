use crate::bus::{RegisterBus, RegisterBusExt};
use crate::error::{self, Bme680Error};
use crate::regs::{self, calib_mem};

/// Sensor generation, read from the variant register.
///
/// Both report chip id `0x61`; they differ in the gas ADC registers and the gas formula.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// Low-range gas sensor.
    #[default]
    Bme680,
    /// High-range gas sensor.
    Bme688,
}

impl Variant {
    pub(crate) fn from_reg(value: u8) -> Self {
        if value == regs::VARIANT_ID_BME688 {
            Variant::Bme688
        } else {
            Variant::Bme680
        }
    }

    /// `run_gas` value that enables gas conversions on this variant.
    pub(crate) fn run_gas(self) -> u8 {
        match self {
            Variant::Bme680 => 0b01,
            Variant::Bme688 => 0b10,
        }
    }
}

/// Factory-fused calibration coefficients read from the sensor.
/// These are unique to every individual chip and required for compensation formulas.
///
/// Loaded once by [`load`] and never changed afterwards.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibData {
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    pub par_g1: i8,
    pub par_g2: i16,
    pub par_g3: i8,
    pub res_heat_range: u8,
    pub res_heat_val: i8,
    pub range_sw_err: i8,
    pub variant: Variant,
}

fn concat_u16(msb: u8, lsb: u8) -> u16 {
    ((msb as u16) << 8) | lsb as u16
}

fn concat_i16(msb: u8, lsb: u8) -> i16 {
    concat_u16(msb, lsb) as i16
}

impl CalibData {
    /// Decodes the coefficient blocks.
    ///
    /// `coeff` holds the block at `0x89` (25 bytes) followed by the block at `0xE1` (16 bytes),
    /// `heat` the 5 bytes starting at `0x00`. See BME680 datasheet, Section 3.11.1.
    pub fn from_registers(
        coeff: &[u8; calib_mem::COEFF_SIZE],
        heat: &[u8; 5],
        variant: Variant,
    ) -> Self {
        let b = coeff;
        CalibData {
            par_t1: concat_u16(b[34], b[33]),
            par_t2: concat_i16(b[2], b[1]),
            par_t3: b[3] as i8,
            par_p1: concat_u16(b[6], b[5]),
            par_p2: concat_i16(b[8], b[7]),
            par_p3: b[9] as i8,
            par_p4: concat_i16(b[12], b[11]),
            par_p5: concat_i16(b[14], b[13]),
            par_p6: b[16] as i8,
            par_p7: b[15] as i8,
            par_p8: concat_i16(b[20], b[19]),
            par_p9: concat_i16(b[22], b[21]),
            par_p10: b[23],
            // H1 and H2 share the nibbles of register 0xE2
            par_h1: ((b[27] as u16) << 4) | (b[26] & 0x0F) as u16,
            par_h2: ((b[25] as u16) << 4) | (b[26] >> 4) as u16,
            par_h3: b[28] as i8,
            par_h4: b[29] as i8,
            par_h5: b[30] as i8,
            par_h6: b[31],
            par_h7: b[32] as i8,
            par_g1: b[37] as i8,
            par_g2: concat_i16(b[36], b[35]),
            par_g3: b[38] as i8,
            res_heat_val: heat[0] as i8,
            res_heat_range: (heat[2] & 0x30) >> 4,
            range_sw_err: (heat[4] as i8) >> 4,
            variant,
        }
    }
}

/// Reads the chip-id register and fails fast if it does not identify a BME680/BME688.
pub(crate) fn check_chip_id<B: RegisterBus>(
    bus: &mut B,
    address: u8,
) -> error::Result<(), B::Error> {
    let actual = bus.read_reg_byte(address, regs::ADDR_CHIP_ID)?;
    if actual != regs::CHIP_ID {
        error!("chip id mismatch at {}: read {}", address, actual);
        return Err(Bme680Error::ChipIdMismatch {
            expected: regs::CHIP_ID,
            actual,
        });
    }
    Ok(())
}

/// Validates the chip identity and reads the factory calibration.
///
/// The BME680 stores calibration data in three non-contiguous memory blocks, all of which are
/// burst-read. Only reads are issued, so a wrong device on `address` is never written to.
pub fn load<B: RegisterBus>(bus: &mut B, address: u8) -> error::Result<CalibData, B::Error> {
    check_chip_id(bus, address)?;
    let variant = Variant::from_reg(bus.read_reg_byte(address, regs::ADDR_VARIANT_ID)?);

    let mut coeff = [0u8; calib_mem::COEFF_SIZE];
    let mut heat = [0u8; 5];

    // 1. 0x89..0xA1
    bus.read_into(address, calib_mem::ADDR[0], &mut coeff[..calib_mem::SIZES[0]])?;
    // 2. 0xE1..0xF0
    bus.read_into(address, calib_mem::ADDR[1], &mut coeff[calib_mem::SIZES[0]..])?;
    // 3. 0x00..0x04, heater resistance and range switching error
    bus.read_into(address, calib_mem::ADDR[2], &mut heat)?;

    let calib = CalibData::from_registers(&coeff, &heat, variant);
    debug!(
        "calibration loaded: t1={} p1={} h1={} g2={}",
        calib.par_t1,
        calib.par_p1,
        calib.par_h1,
        calib.par_g2
    );
    Ok(calib)
}
