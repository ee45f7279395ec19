//! CRC-16 for persisted records.
//!
//! Reflected polynomial 0xA001 (0x8005), initial value 0xFFFF, no final XOR.
//! This is the CRC-16/MODBUS parameter set, bit-compatible with avr-libc's
//! `_crc16_update` seeded with 0xFFFF, so logs written by the AVR firmware
//! remain readable.

use crc::{CRC_16_MODBUS, Crc};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Calculate the CRC-16 of `data`.
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
