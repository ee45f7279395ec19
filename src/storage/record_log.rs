//! Durable append-only record log over a [`StorageMedium`].
//!
//! ## Layout
//!
//! ```text
//! | reserved prefix | slot 0 | slot 1 | ... | slot capacity-1 | unused tail |
//! ```
//!
//! Slots `[0, count)` hold valid records in append order and slot `count`
//! (if it exists) is always null. The record count is never stored: it is
//! recovered at boot by scanning from slot 0 to the first null or invalid
//! slot. An interrupted write leaves a slot with a bad checksum, which the
//! scan treats exactly like the end of the log.
//!
//! ## Append protocol
//!
//! 1. Zero slot `count + 1`, so the next boot's scan has a null slot to stop
//!    at even if the write below is interrupted half way.
//! 2. Write the sealed record to slot `count`.
//! 3. Increment the in-memory count.

use log::{debug, info};

use super::{LogError, Record, StorageMedium};

/// Append-only log of [`Record`]s.
pub struct RecordLog<S> {
    storage: S,
    reserved_prefix: u32,
    capacity: u32,
    count: u32,
    recovered: bool,
}

impl<S: StorageMedium> RecordLog<S> {
    /// Create a log over `storage`, leaving the first `reserved_prefix` bytes
    /// untouched.
    ///
    /// The count is unknown until [`RecordLog::recover`] runs. Appends and
    /// reads before that recover first.
    pub fn new(storage: S, reserved_prefix: u32) -> Self {
        let capacity = storage.size().saturating_sub(reserved_prefix) / Record::SIZE as u32;
        Self {
            storage,
            reserved_prefix,
            capacity,
            count: 0,
            recovered: false,
        }
    }

    /// Scan the slots to re-establish the record count.
    ///
    /// Reads `count + 1` slots (fewer when the log is full).
    pub fn recover(&mut self) -> u32 {
        let mut index = 0;
        while index < self.capacity {
            let record = Record::from_bytes(&self.read_slot(index));
            if !record.is_valid() {
                if !record.is_null() {
                    info!("Slot {} holds an invalid record, log ends there", index);
                }
                break;
            }
            index += 1;
        }
        self.count = index;
        self.recovered = true;
        debug!("Recovered {} of {} records", self.count, self.capacity);
        self.count
    }

    /// Append a record at the frontier.
    ///
    /// The record is resealed before writing, so its stored checksum always
    /// matches its stored bytes.
    pub fn append(&mut self, record: &Record) -> Result<(), LogError> {
        self.ensure_recovered();
        if self.count >= self.capacity {
            return Err(LogError::Full {
                capacity: self.capacity,
            });
        }

        let next = self.count + 1;
        if next < self.capacity {
            self.zero_slot(next);
        }

        let sealed = Record::new(record.timestamp(), record.reading());
        self.write_slot(self.count, &sealed);
        self.count += 1;
        Ok(())
    }

    /// Read the record at `index`, or [`Record::NULL`] past the end of the log.
    pub fn read(&mut self, index: u32) -> Record {
        self.ensure_recovered();
        if index >= self.count {
            return Record::NULL;
        }
        Record::from_bytes(&self.read_slot(index))
    }

    /// Erase the log by nulling slots 0 and 1.
    ///
    /// Later slots become unreachable and are zeroed lazily by `append`.
    pub fn format(&mut self) {
        for index in 0..self.capacity.min(2) {
            self.zero_slot(index);
        }
        self.count = 0;
        self.recovered = true;
    }

    /// Iterate over the records in `[0, count)`.
    pub fn records(&mut self) -> Records<'_, S> {
        self.ensure_recovered();
        Records {
            end: self.count,
            log: self,
            index: 0,
        }
    }

    /// True once the record count reflects the medium.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Slots left before the log is full.
    pub fn remaining(&self) -> u32 {
        self.capacity - self.count
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn ensure_recovered(&mut self) {
        if !self.recovered {
            self.recover();
        }
    }

    fn slot_address(&self, index: u32) -> u32 {
        self.reserved_prefix + index * Record::SIZE as u32
    }

    fn read_slot(&mut self, index: u32) -> [u8; Record::SIZE] {
        let mut bytes = [0u8; Record::SIZE];
        let address = self.slot_address(index);
        self.storage.read_bytes(address, &mut bytes);
        bytes
    }

    fn write_slot(&mut self, index: u32, record: &Record) {
        let address = self.slot_address(index);
        self.storage.write_bytes(address, &record.to_bytes());
    }

    fn zero_slot(&mut self, index: u32) {
        let address = self.slot_address(index);
        self.storage.write_bytes(address, &[0u8; Record::SIZE]);
    }
}

/// Iterator returned by [`RecordLog::records`].
pub struct Records<'a, S> {
    log: &'a mut RecordLog<S>,
    index: u32,
    end: u32,
}

impl<S: StorageMedium> Iterator for Records<'_, S> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.index >= self.end {
            return None;
        }
        let record = self.log.read(self.index);
        self.index += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.index) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Reading;
    use crate::storage::RamStorage;

    fn record(timestamp: u32) -> Record {
        Record::new(timestamp, Reading::new(20.0 + timestamp as f32 / 100.0, 45.0))
    }

    #[test]
    fn test_capacity_excludes_reserved_prefix() {
        let log = RecordLog::new(RamStorage::<1024>::new(), 100);
        assert_eq!(log.capacity(), (1024 - 100) / 14);
    }

    #[test]
    fn test_capacity_of_tiny_medium_is_zero() {
        let log = RecordLog::new(RamStorage::<8>::new(), 16);
        assert_eq!(log.capacity(), 0);
    }

    #[test]
    fn test_blank_storage_recovers_empty() {
        let mut log = RecordLog::new(RamStorage::<256>::new(), 0);
        assert_eq!(log.recover(), 0);
        assert_eq!(log.remaining(), log.capacity());
    }

    #[test]
    fn test_append_then_read() {
        let mut log = RecordLog::new(RamStorage::<256>::new(), 0);
        log.recover();
        log.append(&record(1000)).unwrap();
        log.append(&record(1060)).unwrap();

        assert_eq!(log.count(), 2);
        assert_eq!(log.read(0), record(1000));
        assert_eq!(log.read(1), record(1060));
    }

    #[test]
    fn test_read_past_end_is_null() {
        let mut log = RecordLog::new(RamStorage::<256>::new(), 0);
        log.recover();
        log.append(&record(1000)).unwrap();
        assert!(log.read(1).is_null());
        assert!(log.read(500).is_null());
    }

    #[test]
    fn test_reserved_prefix_is_never_written() {
        let mut storage = RamStorage::<128>::new();
        storage.as_bytes_mut()[..10].fill(0xaa);

        let mut log = RecordLog::new(&mut storage, 10);
        log.recover();
        log.append(&record(1)).unwrap();
        log.format();

        assert!(storage.as_bytes()[..10].iter().all(|b| *b == 0xaa));
    }

    #[test]
    fn test_records_iterator() {
        let mut log = RecordLog::new(RamStorage::<256>::new(), 0);
        log.recover();
        for ts in 1..=3 {
            log.append(&record(ts)).unwrap();
        }

        let timestamps: Vec<u32> = log.records().map(|r| r.timestamp()).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
    }

    #[test]
    fn test_append_before_recover_keeps_stored_records() {
        let mut storage = RamStorage::<256>::new();
        {
            let mut log = RecordLog::new(&mut storage, 0);
            log.recover();
            for ts in 1..=3 {
                log.append(&record(ts)).unwrap();
            }
        }

        let mut log = RecordLog::new(&mut storage, 0);
        assert!(!log.is_recovered());
        log.append(&record(4)).unwrap();
        assert!(log.is_recovered());
        assert_eq!(log.count(), 4);
        assert_eq!(log.read(0), record(1));
    }

    #[test]
    fn test_read_before_recover_sees_stored_records() {
        let mut storage = RamStorage::<256>::new();
        {
            let mut log = RecordLog::new(&mut storage, 0);
            log.recover();
            log.append(&record(9)).unwrap();
        }

        let mut log = RecordLog::new(&mut storage, 0);
        assert_eq!(log.read(0), record(9));
        assert_eq!(log.count(), 1);
    }

    #[test]
    fn test_format_resets_count() {
        let mut log = RecordLog::new(RamStorage::<256>::new(), 0);
        log.recover();
        log.append(&record(5)).unwrap();
        log.format();

        assert_eq!(log.count(), 0);
        assert_eq!(log.recover(), 0);
    }
}
