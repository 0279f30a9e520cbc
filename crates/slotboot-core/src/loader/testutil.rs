//! Shared test doubles for the loader modules

use zerocopy::byteorder::U16;
use zerocopy::{FromZeros, IntoBytes};

use crate::error::{Error, Result};
use crate::info::{BootloaderInfo, SLOT_UNUSED_VERSION};
use crate::loader::access::FlashAccess;

/// Build a record with the first `versions.len()` slots provisioned and the
/// rest erased.
pub fn test_record(versions: &[u16]) -> BootloaderInfo {
    let mut info = BootloaderInfo::new_zeroed();
    for slot in info.fw_info.iter_mut() {
        slot.version = U16::new(SLOT_UNUSED_VERSION);
    }
    for (i, &v) in versions.iter().enumerate() {
        info.fw_info[i].version = U16::new(v);
    }
    info.total_firmwares = versions.len() as u8;
    info
}

/// Array-backed [`FlashAccess`] with NOR semantics and fault injection.
pub struct MemFlash {
    pub data: [u8; 8192],
    pub open: bool,
    pub fail_reads: bool,
    pub corrupt_writes: bool,
}

impl MemFlash {
    /// Fully erased flash
    pub fn new() -> Self {
        Self {
            data: [0xFF; 8192],
            open: false,
            fail_reads: false,
            corrupt_writes: false,
        }
    }

    /// Flash seeded with a serialized info record at offset 0
    pub fn with_record(record: &BootloaderInfo) -> Self {
        let mut flash = Self::new();
        let bytes = record.as_bytes();
        flash.data[..bytes.len()].copy_from_slice(bytes);
        flash
    }
}

impl FlashAccess for MemFlash {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if self.fail_reads {
            return Err(Error::SpiTransferFailed);
        }
        let addr = addr as usize;
        buf.copy_from_slice(&self.data[addr..addr + buf.len()]);
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: usize) -> Result<()> {
        let start = (addr as usize) & !0xFFF;
        let sectors = len.div_ceil(4096);
        for byte in &mut self.data[start..start + sectors * 4096] {
            *byte = 0xFF;
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let addr = addr as usize;
        for (i, &byte) in data.iter().enumerate() {
            // programming only clears bits
            self.data[addr + i] &= byte;
        }
        if self.corrupt_writes {
            self.data[addr] &= 0xF0;
        }
        Ok(())
    }
}
