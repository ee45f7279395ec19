//! Desktop simulator for the climate-logger core.
//!
//! Runs the real scheduler, record log and DHT22 decoder against simulated
//! hardware: a storage image file, a clock that only advances while the
//! "CPU" sleeps, and a data line that answers the start signal with a
//! genuine DHT22 waveform.
//!
//! # Environment
//!
//! Read from the process environment and an optional `.env` file.
//!
//! | Variable              | Default            | Meaning                              |
//! |-----------------------|--------------------|--------------------------------------|
//! | `LOGGER_IMAGE`        | `logger.img`       | Storage image path                   |
//! | `LOGGER_STORAGE_SIZE` | `32768`            | Image size in bytes (32 KB FRAM)     |
//! | `LOGGER_MODE`         | `2`                | Mode switch code, 0-9                |
//! | `LOGGER_SAMPLES`      | `100`              | Frames answered before the sensor dies |
//! | `LOGGER_START_TIME`   | now                | Simulated clock start, Unix seconds  |
//! | `LOGGER_JITTER`       | `2`                | Max seconds a wake-up is late        |
//! | `RUST_LOG`            | `info`             | Log filter                           |

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::{error, info, warn};

use climate_logger::mode::FixedMode;
use climate_logger::sensors::{Dht22, DualModeLine, FRAME_BITS, Frame};
use climate_logger::signal::{Console, Diagnostics};
use climate_logger::storage::{StorageInitError, StorageMedium};
use climate_logger::time::{Clock, PowerSave};
use climate_logger::{LoggerConfig, ModeSelector, Reading, RunOutcome, SampleScheduler};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

struct SimSettings {
    image: PathBuf,
    storage_size: u32,
    mode: u8,
    samples: u32,
    start_time: u32,
    jitter: u32,
}

impl SimSettings {
    fn from_env() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();

        Self {
            image: std::env::var("LOGGER_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logger.img")),
            storage_size: env_or("LOGGER_STORAGE_SIZE", 32 * 1024),
            mode: env_or("LOGGER_MODE", 2),
            samples: env_or("LOGGER_SAMPLES", 100),
            start_time: env_or("LOGGER_START_TIME", now),
            jitter: env_or("LOGGER_JITTER", 2),
        }
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {}={:?}, using {}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Storage image
// ---------------------------------------------------------------------------

/// Byte-addressable storage backed by a file, written through on every byte
/// so a killed simulator leaves the same torn state a power cut would.
struct FileStorage {
    file: Option<File>,
    bytes: Vec<u8>,
}

impl FileStorage {
    fn open(path: &Path, size: u32) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        if bytes.len() != size as usize {
            info!("Resizing storage image {} to {} bytes", path.display(), size);
            bytes.resize(size as usize, 0);
            file.set_len(u64::from(size))?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&bytes)?;
        }

        Ok(Self {
            file: Some(file),
            bytes,
        })
    }

    /// Storage whose image could not be opened; fails `init`.
    fn missing() -> Self {
        Self {
            file: None,
            bytes: Vec::new(),
        }
    }

    fn persist(&mut self, address: u32, data: &[u8]) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(u64::from(address)))?;
            file.write_all(data)?;
        }
        Ok(())
    }
}

impl StorageMedium for FileStorage {
    fn init(&mut self) -> Result<(), StorageInitError> {
        match self.file {
            Some(_) => Ok(()),
            None => Err(StorageInitError::Unavailable),
        }
    }

    fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn read_byte(&mut self, address: u32) -> u8 {
        self.bytes.get(address as usize).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        self.write_bytes(address, &[value]);
    }

    fn write_bytes(&mut self, address: u32, data: &[u8]) {
        let start = address as usize;
        let Some(target) = self.bytes.get_mut(start..start + data.len()) else {
            return;
        };
        target.copy_from_slice(data);
        if let Err(e) = self.persist(address, data) {
            error!("Storage image write at {} failed: {}", address, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Clock and power
// ---------------------------------------------------------------------------

/// Simulated wall-clock seconds, shared by the clock and the power control.
type SimTime = Rc<Cell<u32>>;

struct SimClock {
    time: SimTime,
}

impl Clock for SimClock {
    fn now(&mut self) -> u32 {
        self.time.get()
    }
}

/// Sleeping advances simulated time, waking up to `jitter` seconds late.
struct SimPower {
    time: SimTime,
    jitter: u32,
    seed: u64,
    halted: bool,
}

impl SimPower {
    fn lateness(&mut self) -> u32 {
        if self.jitter == 0 {
            return 0;
        }
        self.seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.seed >> 33) % u64::from(self.jitter + 1)) as u32
    }
}

impl PowerSave for SimPower {
    fn sleep(&mut self, seconds: u32) {
        let late = self.lateness();
        self.time
            .set(self.time.get().saturating_add(seconds).saturating_add(late));
    }

    fn halt(&mut self) {
        info!("CPU halted, reset required");
        self.halted = true;
    }
}

// ---------------------------------------------------------------------------
// Sensor line
// ---------------------------------------------------------------------------

/// Polls per microsecond of simulated waveform
const POLLS_PER_US: u32 = 1;

/// Data line with a simulated DHT22 on the other end.
///
/// After `samples` answered frames the sensor stops responding, which ends
/// a logging run with a timeout.
struct SimSensorLine {
    time: SimTime,
    phases: VecDeque<(bool, u32)>,
    answered: u32,
    samples: u32,
    driven_high: bool,
    start_signal_sent: bool,
}

impl SimSensorLine {
    fn new(time: SimTime, samples: u32) -> Self {
        Self {
            time,
            phases: VecDeque::new(),
            answered: 0,
            samples,
            driven_high: true,
            start_signal_sent: false,
        }
    }

    /// Slow daily temperature cycle with humidity moving against it.
    fn ambient(&self) -> Reading {
        let hours = f64::from(self.time.get() % 86_400) / 3600.0;
        let phase = (hours - 9.0) / 24.0 * std::f64::consts::TAU;
        Reading::new(
            (21.0 + 4.0 * phase.sin()) as f32,
            (55.0 - 12.0 * phase.sin()) as f32,
        )
    }

    fn answer(&mut self) {
        self.phases.clear();
        if self.answered >= self.samples {
            return;
        }
        self.answered += 1;

        let frame = Frame::from_reading(self.ambient());
        self.phases.push_back((false, 80 * POLLS_PER_US));
        self.phases.push_back((true, 80 * POLLS_PER_US));
        for bit in 0..FRAME_BITS {
            let one = frame.as_bytes()[bit / 8] & (0x80 >> (bit % 8)) != 0;
            let high_us = if one { 70 } else { 26 };
            self.phases.push_back((false, 50 * POLLS_PER_US));
            self.phases.push_back((true, high_us * POLLS_PER_US));
        }
        self.phases.push_back((false, 50 * POLLS_PER_US));
    }

    fn poll(&mut self) -> bool {
        while let Some((level, remaining)) = self.phases.front_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return *level;
            }
            self.phases.pop_front();
        }
        self.driven_high
    }
}

impl ErrorType for SimSensorLine {
    type Error = Infallible;
}

impl InputPin for SimSensorLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.poll())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.poll())
    }
}

impl OutputPin for SimSensorLine {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.driven_high = false;
        self.start_signal_sent = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.driven_high = true;
        Ok(())
    }
}

impl DualModeLine for SimSensorLine {
    fn set_as_input(&mut self) {
        self.driven_high = true;
        if self.start_signal_sent {
            self.start_signal_sent = false;
            self.answer();
        }
    }

    fn set_as_output(&mut self) {
        self.phases.clear();
    }
}

/// Simulated time only moves while sleeping.
struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Serial console on stdout.
struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_line(&mut self, line: std::fmt::Arguments<'_>) {
        println!("{line}");
    }
}

/// Error codes go to the log instead of an LED.
struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn signal(&mut self, code: u8) {
        warn!("Signal LED: {} blinks", code);
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = SimSettings::from_env();
    info!("Starting climate-logger simulator");
    info!(
        "Image {} ({} bytes), mode {}, {} samples, jitter {} s",
        settings.image.display(),
        settings.storage_size,
        settings.mode,
        settings.samples,
        settings.jitter
    );

    let storage = FileStorage::open(&settings.image, settings.storage_size).unwrap_or_else(|e| {
        error!("Cannot open storage image {}: {}", settings.image.display(), e);
        FileStorage::missing()
    });

    let time: SimTime = Rc::new(Cell::new(settings.start_time));
    let config = LoggerConfig::default();
    let sensor = Dht22::with_config(
        SimSensorLine::new(time.clone(), settings.samples),
        NoDelay,
        &config,
    );
    let clock = SimClock { time: time.clone() };
    let mut power = SimPower {
        time: time.clone(),
        jitter: settings.jitter,
        seed: u64::from(settings.start_time),
        halted: false,
    };

    println!("Climate Logger");
    println!("--------------");

    let mut diagnostics = LogDiagnostics;
    let mut scheduler =
        SampleScheduler::new(sensor, storage, clock, &mut power, StdoutConsole, config);

    let startup = match scheduler.start() {
        Ok(startup) => startup,
        Err(e) => {
            error!("Startup failed: {}", e);
            e.signal(&mut diagnostics);
            return ExitCode::from(e.error_code());
        }
    };
    if let Some(warning) = startup.warning() {
        warning.signal(&mut diagnostics);
    }

    let mode = FixedMode(settings.mode).select();
    let result = scheduler.run(mode);
    let records = scheduler.log().count();
    drop(scheduler);

    match result {
        Ok(RunOutcome::Dumped { records }) => info!("Dumped {} records", records),
        Ok(RunOutcome::Formatted) => info!("Storage image formatted"),
        Err(e) => {
            info!(
                "Logging ended after {} simulated seconds with {} records stored",
                time.get().saturating_sub(settings.start_time),
                records
            );
            e.signal(&mut diagnostics);
            return ExitCode::from(e.error_code());
        }
    }

    if !power.halted {
        warn!("Run ended without halting the CPU");
    }
    ExitCode::SUCCESS
}
