pub mod dht22;
pub mod line;

pub use dht22::{Dht22, FRAME_BITS, Frame};
pub use line::{DualModeLine, OpenDrainLine};

use core::fmt;
use thiserror_no_std::Error;

/// Lowest temperature a record may hold (absolute zero)
pub const TEMPERATURE_MIN: f32 = -273.15;
/// Highest temperature a record may hold
pub const TEMPERATURE_MAX: f32 = 100.0;
/// Lowest relative humidity a record may hold
pub const HUMIDITY_MIN: f32 = 0.0;
/// Highest relative humidity a record may hold
pub const HUMIDITY_MAX: f32 = 100.0;

/// One calibrated temperature/humidity measurement.
///
/// The decoder reports whatever the sensor sent; range clamping is the job of
/// the record that persists it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Percent relative humidity
    pub humidity: f32,
}

impl Reading {
    pub const fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }

    /// True if both values lie inside the persistable ranges.
    pub fn is_in_range(&self) -> bool {
        (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&self.temperature)
            && (HUMIDITY_MIN..=HUMIDITY_MAX).contains(&self.humidity)
    }

    /// Clamp both values to the persistable ranges.
    ///
    /// `f32::max` ignores NaN, so a NaN value lands on the lower bound.
    pub fn clamped(self) -> Self {
        Self {
            temperature: self.temperature.max(TEMPERATURE_MIN).min(TEMPERATURE_MAX),
            humidity: self.humidity.max(HUMIDITY_MIN).min(HUMIDITY_MAX),
        }
    }
}

/// Position in the frame where decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The sensor's response pulse before the data bits
    StartPulse,
    /// Data bit, 0 is the most significant bit of the first byte
    Bit(u8),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartPulse => f.write_str("start pulse"),
            Self::Bit(index) => write!(f, "bit {index}"),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Sensor timed out during {phase}")]
    Timeout { phase: Phase },
    #[error("Frame checksum mismatch (expected {expected:#04x}, received {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// A source of temperature/humidity readings.
///
/// Implementations never retry: a failed read is reported as is and the
/// caller owns the retry policy.
pub trait Sensor {
    fn read(&mut self) -> Result<Reading, DecodeError>;
}

impl<T: Sensor + ?Sized> Sensor for &mut T {
    fn read(&mut self) -> Result<Reading, DecodeError> {
        (**self).read()
    }
}
