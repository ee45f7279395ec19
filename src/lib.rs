#![cfg_attr(not(test), no_std)]

//! DHT22 temperature/humidity logger core.
//!
//! Decodes the sensor's single-wire frames, keeps a crash-safe append-only
//! record log on byte-addressable non-volatile memory, and schedules samples
//! on a fixed, drift-free cadence. All hardware is reached through traits so
//! the same code runs on the device and on a desktop host.

pub mod config;
pub mod error;
pub mod mode;
pub mod scheduler;
pub mod sensors;
pub mod signal;
pub mod storage;
pub mod time;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use mode::{LogInterval, ModeSelector, RunMode};
pub use scheduler::{RunOutcome, SampleScheduler, Startup};
pub use sensors::{DecodeError, Reading, Sensor};
pub use storage::{Record, RecordLog, StorageMedium};
