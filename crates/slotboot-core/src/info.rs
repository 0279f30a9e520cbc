//! The persisted bootloader info block
//!
//! A fixed-layout record at a well-known flash offset describing up to
//! eight firmware slots, the current/failsafe selection and per-slot boot
//! health counters. It is the single source of truth for "which image is
//! good": read at boot and updated exactly once per boot cycle, either by
//! marking a success or by charging a failure before retry/fallback.
//!
//! The layout is shared with every firmware build and must not change:
//! little-endian, no padding, 35 bytes.

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Number of firmware slots in the info block
pub const SLOT_COUNT: usize = 8;

/// Slot version value meaning "slot unused" (the erased-flash pattern)
pub const SLOT_UNUSED_VERSION: u16 = 0xFFFF;

/// Flash offset of the info block record.
///
/// The first 4 KiB sector of the external flash is reserved for it; the
/// value is a build-time constant shared with the firmware build system.
pub const BOOT_INFO_ADDR: u32 = 0x0000_0000;

/// Health record of one firmware slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct FirmwareSlotInfo {
    /// Firmware version; [`SLOT_UNUSED_VERSION`] means the slot is empty
    pub version: U16<LittleEndian>,
    /// Boot attempts that never confirmed success
    pub start_fails: u8,
    /// Confirmed successful boots
    pub start_successes: u8,
}

impl FirmwareSlotInfo {
    /// Whether this slot holds a firmware image
    pub fn is_used(&self) -> bool {
        self.version.get() != SLOT_UNUSED_VERSION
    }
}

/// The on-flash bootloader info record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct BootloaderInfo {
    /// Count of used slots
    pub total_firmwares: u8,
    /// Index of the firmware selected to run
    pub current_firmware: u8,
    /// Index of the designated fallback firmware
    pub failsafe_firmware: u8,
    /// Per-slot health records
    pub fw_info: [FirmwareSlotInfo; SLOT_COUNT],
}

/// Size of the serialized record
pub const BOOT_INFO_SIZE: usize = core::mem::size_of::<BootloaderInfo>();

impl BootloaderInfo {
    /// The slot record at `idx`, if the index is in range
    pub fn slot(&self, idx: u8) -> Option<&FirmwareSlotInfo> {
        self.fw_info.get(idx as usize)
    }

    /// Count the slots whose version is not the erased pattern
    pub fn used_slot_count(&self) -> u8 {
        self.fw_info.iter().filter(|s| s.is_used()).count() as u8
    }

    /// Check the record invariants: `current_firmware` and
    /// `failsafe_firmware` index used slots, and `total_firmwares` matches
    /// the used-slot count.
    pub fn validate(&self) -> Result<()> {
        for idx in [self.current_firmware, self.failsafe_firmware] {
            if !self.slot(idx).is_some_and(|s| s.is_used()) {
                return Err(Error::InvalidArgument);
            }
        }
        if self.total_firmwares != self.used_slot_count() {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Credit a confirmed boot to `slot`, saturating at the counter maximum.
    pub fn record_success(&mut self, slot: u8) -> Result<()> {
        let entry = self.used_slot_mut(slot)?;
        entry.start_successes = entry.start_successes.saturating_add(1);
        Ok(())
    }

    /// Charge a failed boot attempt to `slot`, saturating at the counter
    /// maximum.
    pub fn record_failure(&mut self, slot: u8) -> Result<()> {
        let entry = self.used_slot_mut(slot)?;
        entry.start_fails = entry.start_fails.saturating_add(1);
        Ok(())
    }

    fn used_slot_mut(&mut self, idx: u8) -> Result<&mut FirmwareSlotInfo> {
        match self.fw_info.get_mut(idx as usize) {
            Some(s) if s.is_used() => Ok(s),
            _ => Err(Error::InvalidArgument),
        }
    }
}
