//! Run-level error taxonomy and the diagnostic codes the device signals.

use thiserror_no_std::Error;

use crate::sensors::DecodeError;
use crate::storage::{LogError, StorageInitError};

/// Errors that end (or, for the clock, warn about) a logger run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerError {
    #[error("Sensor decode failed: {0}")]
    Decode(DecodeError),
    #[error("Record log is full ({capacity} records)")]
    LogFull { capacity: u32 },
    #[error("Storage initialisation failed: {0}")]
    StorageInit(StorageInitError),
    #[error("Real-time clock is not running")]
    ClockNotRunning,
}

impl LoggerError {
    /// Blink/diagnostic code for this error.
    ///
    /// Codes 3 to 5 keep the meaning the board's signal LED has always had.
    pub const fn error_code(&self) -> u8 {
        match self {
            Self::ClockNotRunning => 3,
            Self::StorageInit(_) => 4,
            Self::LogFull { .. } => 5,
            Self::Decode(DecodeError::Timeout { .. }) => 6,
            Self::Decode(DecodeError::ChecksumMismatch { .. }) => 7,
        }
    }

    /// Hand the error code to a diagnostics output.
    pub fn signal<D: crate::signal::Diagnostics>(&self, diagnostics: &mut D) {
        diagnostics.signal(self.error_code());
    }
}

impl From<DecodeError> for LoggerError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<LogError> for LoggerError {
    fn from(value: LogError) -> Self {
        match value {
            LogError::Full { capacity } => Self::LogFull { capacity },
        }
    }
}

impl From<StorageInitError> for LoggerError {
    fn from(value: StorageInitError) -> Self {
        Self::StorageInit(value)
    }
}
