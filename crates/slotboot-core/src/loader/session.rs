//! Boot-attempt state machine
//!
//! Per slot, a firmware moves through: unused (erased version), candidate,
//! good (confirmed by `mark_fw_good` this boot), or failed (a prior attempt
//! never confirmed before the next reset). Failure detection works off a
//! small marker persisted in security-register space right before the jump:
//! a marker that is still pending at the next boot proves the attempt died.
//!
//! The marker's `confirmed` byte uses NOR-friendly encoding - it is written
//! in the erased state (0xFF, pending) and programmed to 0x00 to confirm,
//! so confirmation needs no erase.

use log::{info, warn};
use zerocopy::FromZeros;

use crate::error::Result;
use crate::flash::SpiNorFlash;
use crate::info::BootloaderInfo;
use crate::loader::api;
use crate::transport::SpiTransport;

/// Security-register address of the boot marker
pub const BOOT_MARKER_ADDR: u32 = 0x1000;

const MARKER_MAGIC: u8 = 0xA5;
const MARKER_PENDING: u8 = 0xFF;
const MARKER_CONFIRMED: u8 = 0x00;

/// When a slot stops being viable
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    /// A slot with more than this many start failures and no recorded
    /// success is no longer selectable
    pub max_start_fails: u8,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self { max_start_fails: 3 }
    }
}

/// Pick the slot to boot, or `None` when nothing is viable (caller halts
/// rather than jumping into undefined memory).
///
/// `current_firmware` wins unless its failure count exceeds the policy
/// threshold with no success on record; then `failsafe_firmware` is tried
/// under the same rule. Unused slots are never selectable.
pub fn select_boot_slot(info: &BootloaderInfo, policy: &SelectionPolicy) -> Option<u8> {
    let viable = |idx: u8| {
        info.slot(idx).is_some_and(|s| {
            s.is_used() && !(s.start_fails > policy.max_start_fails && s.start_successes == 0)
        })
    };

    if viable(info.current_firmware) {
        Some(info.current_firmware)
    } else if viable(info.failsafe_firmware) {
        Some(info.failsafe_firmware)
    } else {
        None
    }
}

/// One boot attempt, from selection to (optional) confirmation.
pub struct BootSession {
    /// The slot selected to run
    pub slot: u8,
}

impl BootSession {
    /// Run the pre-jump bookkeeping.
    ///
    /// Charges a failure to the previously attempted slot if its marker was
    /// never confirmed, selects a slot per `policy` (rewriting
    /// `current_firmware` when falling back to the failsafe), and persists
    /// a fresh pending marker for the selection. Returns `Ok(None)` when no
    /// slot is viable.
    pub fn begin<T: SpiTransport>(
        flash: &mut SpiNorFlash<T>,
        policy: &SelectionPolicy,
    ) -> Result<Option<Self>> {
        let mut record = BootloaderInfo::new_zeroed();
        api::read_loader_info(flash, &mut record)?;

        let mut marker = [0u8; 3];
        flash.read_security_register(BOOT_MARKER_ADDR, &mut marker)?;
        if marker[0] == MARKER_MAGIC && marker[2] == MARKER_PENDING {
            let failed_slot = marker[1];
            if record.slot(failed_slot).is_some_and(|s| s.is_used()) {
                warn!(
                    "slot {} never confirmed its last boot, charging a failure",
                    failed_slot
                );
                api::mark_fw_failed(flash, failed_slot)?;
                api::read_loader_info(flash, &mut record)?;
            } else {
                warn!("stale boot marker for unused slot {}", failed_slot);
            }
        }

        let Some(slot) = select_boot_slot(&record, policy) else {
            warn!("no viable firmware slot");
            return Ok(None);
        };

        if slot != record.current_firmware {
            info!(
                "slot {} exhausted, falling back to failsafe slot {}",
                record.current_firmware, slot
            );
            api::set_current_firmware(flash, slot)?;
        }

        flash.erase_security_register(BOOT_MARKER_ADDR)?;
        flash.write_security_register(BOOT_MARKER_ADDR, &[MARKER_MAGIC, slot, MARKER_PENDING])?;

        info!("selected firmware slot {}", slot);
        Ok(Some(BootSession { slot }))
    }

    /// Confirm the attempt: credit the success and settle the marker.
    pub fn confirm<T: SpiTransport>(&self, flash: &mut SpiNorFlash<T>) -> Result<()> {
        api::mark_fw_good(flash)?;
        flash.write_security_register(BOOT_MARKER_ADDR + 2, &[MARKER_CONFIRMED])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testutil::test_record;

    #[test]
    fn healthy_current_slot_wins() {
        let mut record = test_record(&[0x0001, 0x0002]);
        record.current_firmware = 0;
        record.failsafe_firmware = 1;
        assert_eq!(
            select_boot_slot(&record, &SelectionPolicy::default()),
            Some(0)
        );
    }

    #[test]
    fn exhausted_current_falls_back_to_failsafe() {
        let mut record = test_record(&[0x0001, 0x0002]);
        record.current_firmware = 0;
        record.failsafe_firmware = 1;
        record.fw_info[0].start_fails = 4;
        assert_eq!(
            select_boot_slot(&record, &SelectionPolicy { max_start_fails: 3 }),
            Some(1)
        );
    }

    #[test]
    fn failures_with_a_success_on_record_stay_viable() {
        let mut record = test_record(&[0x0001, 0x0002]);
        record.current_firmware = 0;
        record.failsafe_firmware = 1;
        record.fw_info[0].start_fails = 200;
        record.fw_info[0].start_successes = 1;
        assert_eq!(
            select_boot_slot(&record, &SelectionPolicy::default()),
            Some(0)
        );
    }

    #[test]
    fn nothing_viable_selects_nothing() {
        let mut record = test_record(&[0x0001, 0x0002]);
        record.current_firmware = 0;
        record.failsafe_firmware = 1;
        record.fw_info[0].start_fails = 10;
        record.fw_info[1].start_fails = 10;
        assert_eq!(select_boot_slot(&record, &SelectionPolicy::default()), None);
    }

    #[test]
    fn unused_slots_are_never_selectable() {
        let record = test_record(&[]);
        assert_eq!(select_boot_slot(&record, &SelectionPolicy::default()), None);
    }
}
