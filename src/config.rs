//! Tunables shared by the decoder and the scheduler.

/// Logger configuration.
///
/// The defaults match the DHT22 timing and the 32 KB FRAM / 1 KB EEPROM
/// boards the logger was built for; tests shrink them freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Bytes at the start of the storage medium that the log never touches
    pub reserved_prefix: u32,
    /// Number of line polls a single pulse phase may take before timing out
    pub pulse_timeout: u32,
    /// Time the line is released high before the start signal
    pub settle_ms: u32,
    /// Length of the low start signal
    pub start_low_ms: u32,
    /// Seconds of warning before a format erases the log
    pub format_countdown_steps: u8,
    /// Upper bound for a single coarse low-power sleep
    pub max_sleep_delay_secs: u32,
}

impl LoggerConfig {
    pub const fn new() -> Self {
        Self {
            reserved_prefix: 0,
            pulse_timeout: 1000,
            settle_ms: 250,
            start_low_ms: 20,
            format_countdown_steps: 10,
            max_sleep_delay_secs: 60,
        }
    }

    pub const fn with_reserved_prefix(mut self, bytes: u32) -> Self {
        self.reserved_prefix = bytes;
        self
    }

    pub const fn with_pulse_timeout(mut self, polls: u32) -> Self {
        self.pulse_timeout = polls;
        self
    }

    pub const fn with_format_countdown(mut self, steps: u8) -> Self {
        self.format_countdown_steps = steps;
        self
    }

    pub const fn with_max_sleep_delay(mut self, secs: u32) -> Self {
        self.max_sleep_delay_secs = secs;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new()
    }
}
