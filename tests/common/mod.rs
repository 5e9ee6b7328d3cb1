//! Register-file model of a BME680 for end-to-end driver tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bme680_core::RegisterBus;

pub const ADDR: u8 = 0x77;

pub const CHIP_ID: u8 = 0xD0;
pub const VARIANT_ID: u8 = 0xF0;
pub const SOFT_RESET: u8 = 0xE0;
pub const FIELD_0: u8 = 0x1D;
pub const RES_HEAT_0: u8 = 0x5A;
pub const GAS_WAIT_0: u8 = 0x64;
pub const CTRL_GAS_0: u8 = 0x70;
pub const CTRL_GAS_1: u8 = 0x71;
pub const CTRL_HUM: u8 = 0x72;
pub const CTRL_MEAS: u8 = 0x74;
pub const CONFIG: u8 = 0x75;

/// Calibration block at 0x89.
pub const COEFF_1: [u8; 25] = [
    0x00, 0x02, 0x67, 0x03, 0x00, 0x7d, 0x8e, 0x43, 0xd6, 0x58, 0x00, 0x8e, 0x1c, 0x7f, 0xff,
    0x2e, 0x1e, 0x00, 0x00, 0x97, 0xf3, 0xb5, 0xf6, 0x1e, 0x00,
];
/// Calibration block at 0xE1.
pub const COEFF_2: [u8; 16] = [
    0x41, 0x8b, 0x2f, 0x00, 0x2d, 0x14, 0x78, 0x9c, 0x55, 0x83, 0xaf, 0xe8, 0xe2, 0x12, 0x00,
    0x00,
];
/// Heater calibration at 0x00: res_heat_val 45, res_heat_range 1, range_sw_err 0.
pub const HEAT: [u8; 5] = [45, 0x00, 0x10, 0x00, 0x00];

/// Field data for raw T/P/H 617472/326759/18345, gas ADC 512 with the given status byte
/// (`range | 0x20 valid | 0x10 stable`) in the BME680 registers.
pub fn field(gas_lsb: u8) -> [u8; 17] {
    let mut buf = [0u8; 17];
    buf[0] = 0x80;
    buf[2..5].copy_from_slice(&[0x4F, 0xC6, 0x70]);
    buf[5..8].copy_from_slice(&[0x96, 0xC0, 0x00]);
    buf[8..10].copy_from_slice(&[0x47, 0xA9]);
    buf[13] = 0x80;
    buf[14] = gas_lsb;
    buf
}

/// Same as [`field`], with the gas result in the BME688 registers.
pub fn field_688(gas_lsb: u8) -> [u8; 17] {
    let mut buf = field(0);
    buf[13] = 0;
    buf[14] = 0;
    buf[15] = 0x80;
    buf[16] = gas_lsb;
    buf
}

/// Gas ADC 512, range 5, valid and heater-stable: 248262 Ohm on the test calibration.
pub const GAS_STABLE_R5: u8 = 0x35;
/// Gas ADC 512, range 4, valid and heater-stable: 499500 Ohm on the test calibration.
pub const GAS_STABLE_R4: u8 = 0x34;
/// Gas ADC 512, range 5, valid, heater not yet stable.
pub const GAS_UNSTABLE_R5: u8 = 0x25;

#[derive(Debug)]
pub struct Inner {
    pub regs: [u8; 256],
    /// Field data handed out per forced cycle; the last one repeats.
    pub frames: VecDeque<[u8; 17]>,
    /// When false, forced mode never completes.
    pub respond: bool,
    pub fail_read_of: Option<u8>,
    pub reads: usize,
    pub writes: Vec<(u8, u8)>,
    pub triggers: usize,
}

/// Shared handle: tests keep a clone to inspect and poke the register file.
#[derive(Debug, Clone)]
pub struct FakeSensor(pub Rc<RefCell<Inner>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

impl FakeSensor {
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[CHIP_ID as usize] = 0x61;
        regs[0x89..0x89 + 25].copy_from_slice(&COEFF_1);
        regs[0xE1..0xE1 + 16].copy_from_slice(&COEFF_2);
        regs[0x00..5].copy_from_slice(&HEAT);
        FakeSensor(Rc::new(RefCell::new(Inner {
            regs,
            frames: VecDeque::from([field(GAS_STABLE_R5)]),
            respond: true,
            fail_read_of: None,
            reads: 0,
            writes: Vec::new(),
            triggers: 0,
        })))
    }

    pub fn bme688() -> Self {
        let sensor = FakeSensor::new();
        sensor.poke(VARIANT_ID, 0x01);
        sensor.0.borrow_mut().frames = VecDeque::from([field_688(GAS_STABLE_R5)]);
        sensor
    }

    pub fn reg(&self, reg: u8) -> u8 {
        self.0.borrow().regs[reg as usize]
    }

    pub fn poke(&self, reg: u8, value: u8) {
        self.0.borrow_mut().regs[reg as usize] = value;
    }

    pub fn set_frames(&self, frames: &[[u8; 17]]) {
        self.0.borrow_mut().frames = frames.iter().copied().collect();
    }

    pub fn set_respond(&self, respond: bool) {
        self.0.borrow_mut().respond = respond;
    }

    pub fn fail_reads_of(&self, reg: u8) {
        self.0.borrow_mut().fail_read_of = Some(reg);
    }

    /// Total number of bus transactions seen so far.
    pub fn traffic(&self) -> usize {
        let inner = self.0.borrow();
        inner.reads + inner.writes.len()
    }

    pub fn write_count(&self) -> usize {
        self.0.borrow().writes.len()
    }

    pub fn triggers(&self) -> usize {
        self.0.borrow().triggers
    }
}

impl Inner {
    fn complete_cycle(&mut self) {
        let frame = if self.frames.len() > 1 {
            self.frames.pop_front()
        } else {
            self.frames.front().copied()
        };
        if let Some(frame) = frame {
            let start = FIELD_0 as usize;
            self.regs[start..start + frame.len()].copy_from_slice(&frame);
        }
        // back to sleep after the cycle
        self.regs[CTRL_MEAS as usize] &= !0x03;
    }
}

impl RegisterBus for FakeSensor {
    type Error = FakeError;

    fn read_block(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut inner = self.0.borrow_mut();
        inner.reads += 1;
        if address != ADDR || inner.fail_read_of == Some(reg) {
            return Err(FakeError);
        }
        let start = reg as usize;
        buf.copy_from_slice(&inner.regs[start..start + buf.len()]);
        Ok(())
    }

    fn write_register(&mut self, address: u8, reg: u8, value: u8) -> Result<(), Self::Error> {
        let mut inner = self.0.borrow_mut();
        inner.writes.push((reg, value));
        if address != ADDR {
            return Err(FakeError);
        }
        match reg {
            SOFT_RESET => {}
            CTRL_MEAS => {
                inner.regs[reg as usize] = value;
                if value & 0x03 == 0x01 {
                    inner.triggers += 1;
                    // a new cycle clears new_data until it completes
                    inner.regs[FIELD_0 as usize] &= !0x80;
                    if inner.respond {
                        inner.complete_cycle();
                    }
                }
            }
            _ => inner.regs[reg as usize] = value,
        }
        Ok(())
    }
}
