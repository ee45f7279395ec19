//! Byte-addressable persistent storage (EEPROM, FRAM, emulated flash).

use super::StorageInitError;

/// Raw persistent storage.
///
/// No atomicity is assumed for multi-byte writes: power may fail after any
/// byte. The record log is designed around that.
pub trait StorageMedium {
    /// Check that the medium is present and usable.
    fn init(&mut self) -> Result<(), StorageInitError> {
        Ok(())
    }

    /// Total size in bytes.
    fn size(&self) -> u32;

    fn read_byte(&mut self, address: u32) -> u8;

    fn write_byte(&mut self, address: u32, value: u8);

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) {
        for (offset, byte) in (address..).zip(buffer.iter_mut()) {
            *byte = self.read_byte(offset);
        }
    }

    fn write_bytes(&mut self, address: u32, data: &[u8]) {
        for (offset, byte) in (address..).zip(data.iter()) {
            self.write_byte(offset, *byte);
        }
    }
}

impl<T: StorageMedium + ?Sized> StorageMedium for &mut T {
    fn init(&mut self) -> Result<(), StorageInitError> {
        (**self).init()
    }

    fn size(&self) -> u32 {
        (**self).size()
    }

    fn read_byte(&mut self, address: u32) -> u8 {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        (**self).write_byte(address, value)
    }

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) {
        (**self).read_bytes(address, buffer)
    }

    fn write_bytes(&mut self, address: u32, data: &[u8]) {
        (**self).write_bytes(address, data)
    }
}

/// Storage held in RAM, zero-filled like a blank EEPROM.
///
/// Used for host tests and as the backing store of emulated media.
/// Accesses past the end read as zero and are otherwise ignored.
pub struct RamStorage<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> RamStorage<N> {
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Direct access for fault injection.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; N] {
        &mut self.bytes
    }
}

impl<const N: usize> Default for RamStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StorageMedium for RamStorage<N> {
    fn size(&self) -> u32 {
        N as u32
    }

    fn read_byte(&mut self, address: u32) -> u8 {
        self.bytes.get(address as usize).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        if let Some(byte) = self.bytes.get_mut(address as usize) {
            *byte = value;
        }
    }

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) {
        let start = address as usize;
        match self.bytes.get(start..start + buffer.len()) {
            Some(source) => buffer.copy_from_slice(source),
            None => {
                for (offset, byte) in (address..).zip(buffer.iter_mut()) {
                    *byte = self.read_byte(offset);
                }
            }
        }
    }
}
