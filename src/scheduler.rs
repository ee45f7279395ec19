//! Run-mode dispatch and the drift-corrected sampling loop.
//!
//! ## Logging cadence
//!
//! ```text
//!   T0        T0+I        T0+2I       T0+3I
//!   |----------|-----------|-----------|
//!   sample     sample      sample      sample
//!    \_ sleep in `sleep_delay` steps, then one exact sleep to the target
//! ```
//!
//! Every target is the previous target plus the interval, never "wake time
//! plus interval", so wake-up jitter does not accumulate.

use core::convert::Infallible;

use log::{debug, error, info, warn};

use crate::config::LoggerConfig;
use crate::error::LoggerError;
use crate::mode::{LogInterval, RunMode};
use crate::sensors::Sensor;
use crate::signal::Console;
use crate::storage::{MIN_SLOTS, Record, RecordLog, StorageInitError, StorageMedium};
use crate::time::{Clock, DateTime, PowerSave, format_duration};

/// Coarse sleep step for an interval: a tenth of it, capped at
/// `max_secs`, and never shorter than one second.
pub fn sleep_delay(interval_secs: u32, max_secs: u32) -> u32 {
    (interval_secs / 10).min(max_secs).max(1)
}

/// Fixed-origin sample schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftSchedule {
    next_record_time: u32,
    interval: u32,
}

impl DriftSchedule {
    /// First target is one interval after `start`.
    pub const fn new(start: u32, interval: u32) -> Self {
        Self {
            next_record_time: start.saturating_add(interval),
            interval,
        }
    }

    pub const fn next_record_time(&self) -> u32 {
        self.next_record_time
    }

    /// Move the target one interval forward from the previous target.
    pub fn advance(&mut self) -> u32 {
        self.next_record_time = self.next_record_time.saturating_add(self.interval);
        self.next_record_time
    }

    /// Seconds until the target; negative once it has passed.
    pub fn remaining(&self, now: u32) -> i64 {
        i64::from(self.next_record_time) - i64::from(now)
    }
}

/// State found by [`SampleScheduler::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Startup {
    /// Records recovered from storage
    pub records: u32,
    pub clock_running: bool,
}

impl Startup {
    /// The non-fatal condition to signal, if any.
    pub fn warning(&self) -> Option<LoggerError> {
        (!self.clock_running).then_some(LoggerError::ClockNotRunning)
    }
}

/// How a terminal mode ended. Logging never ends without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Dumped { records: u32 },
    Formatted,
}

/// Owns every peripheral for one run and drives the selected mode.
pub struct SampleScheduler<Se, St, C, P, W> {
    sensor: Se,
    log: RecordLog<St>,
    clock: C,
    power: P,
    console: W,
    config: LoggerConfig,
    schedule: Option<DriftSchedule>,
}

impl<Se, St, C, P, W> SampleScheduler<Se, St, C, P, W>
where
    Se: Sensor,
    St: StorageMedium,
    C: Clock,
    P: PowerSave,
    W: Console,
{
    pub fn new(
        sensor: Se,
        storage: St,
        clock: C,
        power: P,
        console: W,
        config: LoggerConfig,
    ) -> Self {
        Self {
            sensor,
            log: RecordLog::new(storage, config.reserved_prefix),
            clock,
            power,
            console,
            config,
            schedule: None,
        }
    }

    /// Check the startup preconditions and recover the record count.
    ///
    /// Storage failures are fatal. A stopped clock only produces a warning.
    pub fn start(&mut self) -> Result<Startup, LoggerError> {
        self.log.storage_mut().init()?;

        let size = self.log.storage().size();
        let required = self
            .config
            .reserved_prefix
            .saturating_add(MIN_SLOTS * Record::SIZE as u32);
        if size < required {
            return Err(StorageInitError::TooSmall { size, required }.into());
        }

        let records = self.log.recover();
        info!(
            "Storage ready: {} of {} records used",
            records,
            self.log.capacity()
        );

        let clock_running = self.clock.is_running();
        if !clock_running {
            warn!("Real-time clock is not running, timestamps may be wrong");
            self.console
                .write_line(format_args!("Warning! RTC is not running."));
        }

        Ok(Startup {
            records,
            clock_running,
        })
    }

    /// Run the selected mode to its end.
    ///
    /// Bulk read and format return after [`PowerSave::halt`]; logging only
    /// returns with the error that stopped it. Runs [`Self::start`] first if
    /// it has not run yet.
    pub fn run(&mut self, mode: RunMode) -> Result<RunOutcome, LoggerError> {
        info!("Mode selected: {:?}", mode);
        let result = self.run_mode(mode);
        if let Err(e) = &result {
            error!("Run stopped: {} (code {})", e, e.error_code());
        }
        result
    }

    /// Read the sensor once and append the record stamped `timestamp`.
    pub fn sample_once(&mut self, timestamp: u32) -> Result<Record, LoggerError> {
        self.ensure_started()?;
        let reading = self.sensor.read()?;
        if !reading.is_in_range() {
            warn!(
                "Implausible reading {:.2} C / {:.2} %RH clamped",
                reading.temperature, reading.humidity
            );
        }

        let record = Record::new(timestamp, reading);
        self.log.append(&record)?;
        debug!("Record {}: {}", self.log.count() - 1, record);
        Ok(record)
    }

    /// Sleep in `sleep_delay` steps until the schedule's next target, then
    /// return the clock.
    ///
    /// Always sleeps at least once. Once less than one step is left, a single
    /// exact sleep covers the rest (skipped if the target already passed).
    pub fn wait_until(&mut self, schedule: &DriftSchedule, sleep_delay: u32) -> u32 {
        loop {
            self.power.sleep(sleep_delay);
            let remaining = schedule.remaining(self.clock.now());
            if remaining < i64::from(sleep_delay) {
                if remaining > 0 {
                    self.power.sleep(remaining as u32);
                }
                break;
            }
        }
        self.clock.now()
    }

    pub fn log(&self) -> &RecordLog<St> {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut RecordLog<St> {
        &mut self.log
    }

    /// Schedule of the current (or last) logging run.
    pub fn schedule(&self) -> Option<&DriftSchedule> {
        self.schedule.as_ref()
    }

    pub fn into_parts(self) -> (Se, St, C, P, W) {
        (
            self.sensor,
            self.log.into_inner(),
            self.clock,
            self.power,
            self.console,
        )
    }

    fn ensure_started(&mut self) -> Result<(), LoggerError> {
        if !self.log.is_recovered() {
            self.start()?;
        }
        Ok(())
    }

    fn run_mode(&mut self, mode: RunMode) -> Result<RunOutcome, LoggerError> {
        self.ensure_started()?;
        match mode {
            RunMode::Logging(interval) => {
                let Err(error) = self.run_logging(interval);
                Err(error)
            }
            RunMode::BulkRead => Ok(RunOutcome::Dumped {
                records: self.bulk_read(),
            }),
            RunMode::Format => {
                self.format();
                Ok(RunOutcome::Formatted)
            }
        }
    }

    fn run_logging(&mut self, interval: LogInterval) -> Result<Infallible, LoggerError> {
        let mut timestamp = self.clock.now();
        self.print_summary(interval, timestamp);

        let delay = sleep_delay(interval.secs(), self.config.max_sleep_delay_secs);
        let mut schedule = DriftSchedule::new(timestamp, interval.secs());
        self.schedule = Some(schedule);
        debug!("Sleeping in {} s steps", delay);

        loop {
            self.sample_once(timestamp)?;
            timestamp = self.wait_until(&schedule, delay);
            schedule.advance();
            self.schedule = Some(schedule);
        }
    }

    fn print_summary(&mut self, interval: LogInterval, now: u32) {
        let available = self.log.remaining();
        let recording_time = available.saturating_mul(interval.secs());

        info!(
            "Logging every {}, room for {} more records",
            interval.label(),
            available
        );
        self.console.write_line(format_args!(
            "Logging selected. Interval = {}",
            interval.label()
        ));
        self.console
            .write_line(format_args!("Maximum records: {}", self.log.capacity()));
        self.console
            .write_line(format_args!("Current records: {}", self.log.count()));
        self.console
            .write_line(format_args!("Available records: {}", available));
        self.console.write_line(format_args!(
            "Recording time: {}",
            format_duration(recording_time)
        ));
        self.console
            .write_line(format_args!("Current time: {}", DateTime::from_unix(now)));
        self.console.write_line(format_args!(
            "Recording end time: {}",
            DateTime::from_unix(now.saturating_add(recording_time))
        ));
    }

    fn bulk_read(&mut self) -> u32 {
        let count = self.log.count();
        info!("Dumping {} records", count);
        self.console
            .write_line(format_args!("Read selected. Sending {} records.", count));
        for record in self.log.records() {
            self.console.write_line(format_args!("{record}"));
        }
        self.console
            .write_line(format_args!("Finished successfully. Enter sleep mode."));
        self.power.halt();
        count
    }

    fn format(&mut self) {
        let steps = self.config.format_countdown_steps;
        warn!("Format selected, erasing the log in {} s", steps);
        self.console.write_line(format_args!(
            "Format (!) selected. Format is starting in ~{} seconds.",
            steps
        ));
        for step in 1..=steps {
            self.console.write_line(format_args!("{step}..."));
            self.power.sleep(1);
        }

        self.console
            .write_line(format_args!("Erasing all logged records..."));
        self.log.format();
        info!("Log formatted");
        self.console.write_line(format_args!(
            "Format finished successfully. Enter sleep mode."
        ));
        self.power.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_delay_is_a_tenth_of_the_interval() {
        assert_eq!(sleep_delay(60, 60), 6);
        assert_eq!(sleep_delay(600, 60), 60);
        assert_eq!(sleep_delay(86400, 60), 60);
    }

    #[test]
    fn test_sleep_delay_never_zero() {
        assert_eq!(sleep_delay(10, 60), 1);
        assert_eq!(sleep_delay(5, 60), 1);
        assert_eq!(sleep_delay(600, 0), 1);
    }

    #[test]
    fn test_schedule_advances_from_previous_target() {
        let t0 = 1_700_000_000;
        let mut schedule = DriftSchedule::new(t0, 60);
        assert_eq!(schedule.next_record_time(), t0 + 60);

        for _ in 1..1000 {
            schedule.advance();
        }
        assert_eq!(schedule.next_record_time(), t0 + 60_000);
    }

    #[test]
    fn test_schedule_remaining_goes_negative() {
        let schedule = DriftSchedule::new(100, 10);
        assert_eq!(schedule.remaining(95), 15);
        assert_eq!(schedule.remaining(110), 0);
        assert_eq!(schedule.remaining(113), -3);
    }

    #[test]
    fn test_startup_warning_only_for_stopped_clock() {
        let ok = Startup {
            records: 3,
            clock_running: true,
        };
        let stopped = Startup {
            records: 3,
            clock_running: false,
        };
        assert_eq!(ok.warning(), None);
        assert_eq!(stopped.warning(), Some(LoggerError::ClockNotRunning));
    }
}
