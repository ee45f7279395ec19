//! Persisted log record.
//!
//! Binary format (little-endian, 14 bytes, no padding):
//! - timestamp: 4 bytes (u32, seconds since the Unix epoch)
//! - humidity: 4 bytes (f32, %RH)
//! - temperature: 4 bytes (f32, °C)
//! - checksum: 2 bytes (u16, CRC-16 of the record with this field zeroed)
//!
//! The field order matches the AVR firmware's packed struct, so existing
//! EEPROM/FRAM images decode unchanged.

use core::fmt;

use super::checksum::calculate_crc16;
use crate::sensors::Reading;
use crate::time::DateTime;

const TIMESTAMP: core::ops::Range<usize> = 0..4;
const HUMIDITY: core::ops::Range<usize> = 4..8;
const TEMPERATURE: core::ops::Range<usize> = 8..12;
const CHECKSUM: core::ops::Range<usize> = 12..14;

/// One timestamped reading as stored in a log slot.
///
/// Records built through [`Record::new`] are always in range and sealed with
/// a matching checksum. Records decoded with [`Record::from_bytes`] carry
/// whatever the slot held and must be checked with [`Record::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    timestamp: u32,
    temperature: f32,
    humidity: f32,
    checksum: u16,
}

impl Record {
    /// Size of one slot in bytes
    pub const SIZE: usize = 14;

    /// The all-zero record: an empty slot, "no data".
    pub const NULL: Record = Record {
        timestamp: 0,
        temperature: 0.0,
        humidity: 0.0,
        checksum: 0,
    };

    /// Build a record from a reading, clamping out-of-range values before the
    /// checksum is computed.
    pub fn new(timestamp: u32, reading: Reading) -> Self {
        let reading = reading.clamped();
        let mut record = Self {
            timestamp,
            temperature: reading.temperature,
            humidity: reading.humidity,
            checksum: 0,
        };
        record.checksum = record.compute_checksum();
        record
    }

    pub const fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    pub const fn humidity(&self) -> f32 {
        self.humidity
    }

    pub const fn checksum(&self) -> u16 {
        self.checksum
    }

    pub const fn reading(&self) -> Reading {
        Reading::new(self.temperature, self.humidity)
    }

    /// CRC-16 over the serialized record with the checksum field zeroed.
    pub fn compute_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[CHECKSUM].fill(0);
        calculate_crc16(&bytes)
    }

    /// True if every byte of the serialized record is zero.
    pub fn is_null(&self) -> bool {
        self.to_bytes().iter().all(|byte| *byte == 0)
    }

    /// True if the record is non-null, in range and its checksum matches.
    pub fn is_valid(&self) -> bool {
        !self.is_null()
            && self.reading().is_in_range()
            && self.checksum == self.compute_checksum()
    }

    /// Converts the record to its slot representation.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[TIMESTAMP].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[HUMIDITY].copy_from_slice(&self.humidity.to_le_bytes());
        bytes[TEMPERATURE].copy_from_slice(&self.temperature.to_le_bytes());
        bytes[CHECKSUM].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Decodes a slot without validating it.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [t0, t1, t2, t3, h0, h1, h2, h3, c0, c1, c2, c3, s0, s1] = *bytes;
        Self {
            timestamp: u32::from_le_bytes([t0, t1, t2, t3]),
            humidity: f32::from_le_bytes([h0, h1, h2, h3]),
            temperature: f32::from_le_bytes([c0, c1, c2, c3]),
            checksum: u16::from_le_bytes([s0, s1]),
        }
    }
}

/// One dump line: `YYYY-MM-DD HH:MM:SS,temperature,humidity`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{:.2},{:.2}",
            DateTime::from_unix(self.timestamp),
            self.temperature,
            self.humidity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        assert_eq!(Record::SIZE, 14, "Record must be exactly 14 bytes");
        assert_eq!(Record::NULL.to_bytes(), [0; 14]);
    }

    #[test]
    fn test_new_record_is_valid() {
        let record = Record::new(1_700_000_000, Reading::new(22.5, 41.0));
        assert!(record.is_valid());
        assert!(!record.is_null());
    }

    #[test]
    fn test_null_record_is_not_valid() {
        assert!(Record::NULL.is_null());
        assert!(!Record::NULL.is_valid());
    }

    #[test]
    fn test_out_of_range_reading_is_clamped_before_sealing() {
        let record = Record::new(1_700_000_000, Reading::new(150.0, -5.0));
        assert_eq!(record.temperature(), 100.0);
        assert_eq!(record.humidity(), 0.0);
        assert!(record.is_valid(), "clamped record must still be valid");
    }

    #[test]
    fn test_byte_layout() {
        let record = Record::new(0x0102_0304, Reading::new(1.0, 2.0));
        let bytes = record.to_bytes();

        assert_eq!(bytes[0..4], [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes[4..8], 2.0f32.to_le_bytes());
        assert_eq!(bytes[8..12], 1.0f32.to_le_bytes());
        assert_eq!(bytes[12..14], record.checksum().to_le_bytes());
    }

    #[test]
    fn test_bytes_preserve_float_bits() {
        let record = Record::new(1_650_000_123, Reading::new(-12.34567, 99.99999));
        let decoded = Record::from_bytes(&record.to_bytes());

        assert_eq!(decoded.timestamp(), 1_650_000_123);
        assert_eq!(decoded.temperature().to_bits(), record.temperature().to_bits());
        assert_eq!(decoded.humidity().to_bits(), record.humidity().to_bits());
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_checksum_covers_every_field() {
        let record = Record::new(1_700_000_000, Reading::new(20.0, 50.0));
        let mut bytes = record.to_bytes();
        bytes[9] ^= 0x01;
        assert!(!Record::from_bytes(&bytes).is_valid());
    }

    #[test]
    fn test_out_of_range_stored_value_is_invalid() {
        let mut bytes = [0u8; Record::SIZE];
        bytes[TIMESTAMP].copy_from_slice(&1u32.to_le_bytes());
        bytes[HUMIDITY].copy_from_slice(&120.0f32.to_le_bytes());
        let crc = calculate_crc16(&bytes);
        bytes[CHECKSUM].copy_from_slice(&crc.to_le_bytes());

        let record = Record::from_bytes(&bytes);
        assert_eq!(record.checksum(), record.compute_checksum());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_display_dump_line() {
        // 2024-03-05 14:07:09 UTC
        let record = Record::new(1_709_647_629, Reading::new(21.456, 55.0));
        assert_eq!(record.to_string(), "2024-03-05 14:07:09,21.46,55.00");
    }

    #[test]
    fn test_display_negative_temperature() {
        let record = Record::new(0, Reading::new(-5.5, 12.25));
        assert_eq!(record.to_string(), "1970-01-01 00:00:00,-5.50,12.25");
    }
}
