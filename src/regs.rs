//! Register map of the BME680/BME688.
//!
//! Addresses and bit positions follow the Bosch datasheet (BST-BME680-DS001, section 5.2)
//! and the BME688 datasheet for the variant-specific gas registers.

/// Chip identification register. Reads [`CHIP_ID`] on both BME680 and BME688.
pub const ADDR_CHIP_ID: u8 = 0xD0;
/// Value of [`ADDR_CHIP_ID`] for a genuine sensor.
pub const CHIP_ID: u8 = 0x61;
/// Variant register, tells a BME680 (low-range gas, `0x00`) from a BME688 (high-range gas).
pub const ADDR_VARIANT_ID: u8 = 0xF0;
pub const VARIANT_ID_BME688: u8 = 0x01;

pub const ADDR_SOFT_RESET: u8 = 0xE0;
pub const CMD_SOFT_RESET: u8 = 0xB6;
/// Time the sensor needs after a soft reset before it answers again.
pub const RESET_PERIOD_MS: u32 = 10;

/// Calibration data is spread over three non-contiguous blocks.
pub mod calib_mem {
    pub const ADDR: [u8; 3] = [0x89, 0xE1, 0x00];
    pub const SIZES: [usize; 3] = [25, 16, 5];
    /// Size of the two coefficient blocks read back to back.
    pub const COEFF_SIZE: usize = 25 + 16;
}

// --- Measurement output ---

/// First register of field 0, the status byte `meas_status_0`.
pub const ADDR_FIELD_0: u8 = 0x1D;
/// Status byte plus everything up to and including the BME688 gas registers.
pub const FIELD_LENGTH: usize = 17;
pub const NEW_DATA_MSK: u8 = 0x80;
pub const GAS_VALID_MSK: u8 = 0x20;
pub const HEAT_STAB_MSK: u8 = 0x10;
pub const GAS_RANGE_MSK: u8 = 0x0F;

// --- Control registers ---

pub const ADDR_RES_HEAT_0: u8 = 0x5A;
pub const ADDR_GAS_WAIT_0: u8 = 0x64;
pub const ADDR_CTRL_GAS_0: u8 = 0x70;
pub const ADDR_CTRL_GAS_1: u8 = 0x71;
pub const ADDR_CTRL_HUM: u8 = 0x72;
pub const ADDR_CTRL_MEAS: u8 = 0x74;
pub const ADDR_CONFIG: u8 = 0x75;

/// `heat_off` bit in `ctrl_gas_0`.
pub const HEAT_OFF_MSK: u8 = 0x08;
/// `run_gas` field in `ctrl_gas_1`.
pub const RUN_GAS_MSK: u8 = 0x30;
pub const RUN_GAS_POS: u8 = 4;
/// `nb_conv` field in `ctrl_gas_1`, selects the heater profile slot.
pub const NB_CONV_MSK: u8 = 0x0F;

pub const OSRS_H_MSK: u8 = 0x07;
pub const OSRS_T_MSK: u8 = 0xE0;
pub const OSRS_T_POS: u8 = 5;
pub const OSRS_P_MSK: u8 = 0x1C;
pub const OSRS_P_POS: u8 = 2;
pub const MODE_MSK: u8 = 0x03;
pub const FILTER_MSK: u8 = 0x1C;
pub const FILTER_POS: u8 = 2;
