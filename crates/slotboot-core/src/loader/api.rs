//! Info-block routines
//!
//! The operations behind the loader interface table: reading the info block
//! out of flash and persisting health-counter updates. Each routine brackets
//! its work in `open`/`close` on the supplied [`FlashAccess`] and propagates
//! the first I/O error unchanged.

use zerocopy::{FromBytes, IntoBytes};

use crate::error::{Error, Result};
use crate::info::{BootloaderInfo, BOOT_INFO_ADDR, BOOT_INFO_SIZE};
use crate::loader::access::FlashAccess;

/// Read the info block into `info`.
///
/// The record is read in full; on any error `info` is left untouched.
pub fn read_loader_info<A: FlashAccess + ?Sized>(
    access: &mut A,
    info: &mut BootloaderInfo,
) -> Result<()> {
    access.open()?;
    let res = read_record(access);
    let close = access.close();

    *info = res?;
    close
}

/// Mark the currently selected firmware as good.
///
/// Increments `start_successes` for `current_firmware`'s slot (saturating)
/// and persists the record. Not idempotent: calling twice in one boot
/// increments twice - callers invoke it at most once per successful boot.
pub fn mark_fw_good<A: FlashAccess + ?Sized>(access: &mut A) -> Result<()> {
    update_info(access, |info| {
        let current = info.current_firmware;
        info.record_success(current)
    })
}

/// Charge a failed boot attempt to `slot` and persist the record.
pub fn mark_fw_failed<A: FlashAccess + ?Sized>(access: &mut A, slot: u8) -> Result<()> {
    update_info(access, |info| info.record_failure(slot))
}

/// Persist a new `current_firmware` selection.
///
/// Used when boot falls back to the failsafe slot, so the record keeps
/// naming the image actually running. The slot must be used.
pub fn set_current_firmware<A: FlashAccess + ?Sized>(access: &mut A, slot: u8) -> Result<()> {
    update_info(access, |info| {
        if !info.slot(slot).is_some_and(|s| s.is_used()) {
            return Err(Error::InvalidArgument);
        }
        info.current_firmware = slot;
        Ok(())
    })
}

fn read_record<A: FlashAccess + ?Sized>(access: &mut A) -> Result<BootloaderInfo> {
    let mut raw = [0u8; BOOT_INFO_SIZE];
    access.read(BOOT_INFO_ADDR, &mut raw)?;
    BootloaderInfo::read_from_bytes(&raw).map_err(|_| Error::CommandFailed)
}

/// Read-mutate-rewrite cycle over the info record: erase the containing
/// sector, program the updated record, and verify it by reading it back.
fn update_info<A, F>(access: &mut A, mutate: F) -> Result<()>
where
    A: FlashAccess + ?Sized,
    F: FnOnce(&mut BootloaderInfo) -> Result<()>,
{
    access.open()?;
    let res = rewrite_record(access, mutate);
    let close = access.close();
    res.and(close)
}

fn rewrite_record<A, F>(access: &mut A, mutate: F) -> Result<()>
where
    A: FlashAccess + ?Sized,
    F: FnOnce(&mut BootloaderInfo) -> Result<()>,
{
    let mut info = read_record(access)?;
    mutate(&mut info)?;

    access.erase(BOOT_INFO_ADDR, BOOT_INFO_SIZE)?;
    access.write(BOOT_INFO_ADDR, info.as_bytes())?;

    let mut check = [0u8; BOOT_INFO_SIZE];
    access.read(BOOT_INFO_ADDR, &mut check)?;
    if check.as_slice() != info.as_bytes() {
        return Err(Error::CommandFailed);
    }

    Ok(())
}
