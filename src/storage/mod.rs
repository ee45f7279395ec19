pub mod checksum;
pub mod medium;
pub mod record;
pub mod record_log;

pub use medium::{RamStorage, StorageMedium};
pub use record::Record;
pub use record_log::{RecordLog, Records};

use thiserror_no_std::Error;

/// Record slots the medium must hold beyond the reserved prefix: the first
/// record and the null slot that marks the append frontier.
pub const MIN_SLOTS: u32 = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageInitError {
    #[error("Storage medium not responding")]
    Unavailable,
    #[error("Storage medium too small ({size} bytes, {required} required)")]
    TooSmall { size: u32, required: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    #[error("Record log is full ({capacity} records)")]
    Full { capacity: u32 },
}
