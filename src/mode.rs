//! Run-mode selection from the 4-bit rotary switch.
//!
//! | Code | Mode |
//! |------|------|
//! | 0-7  | Logging at 10s, 30s, 1m, 10m, 1h, 4h, 8h, 24h |
//! | 8    | Bulk read-out |
//! | 9    | Format |

use embedded_hal::digital::InputPin;
use log::warn;

/// Sampling interval for logging mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogInterval {
    TenSeconds,
    ThirtySeconds,
    OneMinute,
    TenMinutes,
    OneHour,
    FourHours,
    EightHours,
    OneDay,
}

impl LogInterval {
    pub const ALL: [LogInterval; 8] = [
        Self::TenSeconds,
        Self::ThirtySeconds,
        Self::OneMinute,
        Self::TenMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::EightHours,
        Self::OneDay,
    ];

    /// Interval for a logging mode code, `None` for codes 8 and above
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::TenSeconds),
            1 => Some(Self::ThirtySeconds),
            2 => Some(Self::OneMinute),
            3 => Some(Self::TenMinutes),
            4 => Some(Self::OneHour),
            5 => Some(Self::FourHours),
            6 => Some(Self::EightHours),
            7 => Some(Self::OneDay),
            _ => None,
        }
    }

    /// Get the interval in seconds
    pub const fn secs(self) -> u32 {
        match self {
            Self::TenSeconds => 10,
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::TenMinutes => 600,
            Self::OneHour => 3600,
            Self::FourHours => 14400,
            Self::EightHours => 28800,
            Self::OneDay => 86400,
        }
    }

    /// Get a short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::TenSeconds => "10s",
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1m",
            Self::TenMinutes => "10m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::EightHours => "8h",
            Self::OneDay => "24h",
        }
    }
}

/// What the device does for the whole run. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Sample and append records until the log is full or the sensor fails
    Logging(LogInterval),
    /// Dump every record, then halt
    BulkRead,
    /// Erase the log after a countdown, then halt
    Format,
}

impl RunMode {
    pub const BULK_READ_CODE: u8 = 8;
    pub const FORMAT_CODE: u8 = 9;

    /// Map a switch code to a mode.
    ///
    /// Codes above 9 cannot be dialled on a 0-9 switch; they fall back to the
    /// non-destructive bulk read.
    pub fn from_code(code: u8) -> Self {
        if let Some(interval) = LogInterval::from_code(code) {
            return Self::Logging(interval);
        }
        match code {
            Self::BULK_READ_CODE => Self::BulkRead,
            Self::FORMAT_CODE => Self::Format,
            _ => {
                warn!("Unknown mode code {}, falling back to bulk read", code);
                Self::BulkRead
            }
        }
    }
}

/// Source of the mode code.
pub trait ModeSelector {
    /// Raw mode code, normally in `[0, 9]`
    fn mode_code(&mut self) -> u8;

    fn select(&mut self) -> RunMode {
        RunMode::from_code(self.mode_code())
    }
}

/// Mode code fixed at construction (configuration, tests, simulator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMode(pub u8);

impl ModeSelector for FixedMode {
    fn mode_code(&mut self) -> u8 {
        self.0
    }
}

/// BCD rotary switch on four active-low inputs with pull-ups.
///
/// Pins are ordered by weight: 1, 2, 4, 8.
pub struct SwitchModeSelector<P> {
    pins: [P; 4],
}

impl<P: InputPin> SwitchModeSelector<P> {
    pub const fn new(pins: [P; 4]) -> Self {
        Self { pins }
    }

    pub fn release(self) -> [P; 4] {
        self.pins
    }
}

impl<P: InputPin> ModeSelector for SwitchModeSelector<P> {
    fn mode_code(&mut self) -> u8 {
        let mut code = 0;
        for (bit, pin) in self.pins.iter_mut().enumerate() {
            match pin.is_low() {
                Ok(true) => code |= 1 << bit,
                Ok(false) => {}
                Err(e) => warn!("Mode switch input {} unreadable: {:?}", bit, e),
            }
        }
        code
    }
}
