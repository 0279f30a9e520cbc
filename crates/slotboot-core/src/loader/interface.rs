//! The loader interface table
//!
//! The loader occupies the first 0x1000 bytes of the MCU's internal flash;
//! a table describing its API sits in the last 0x40 of those bytes. The
//! table is the only ABI surface between the resident loader and whatever
//! firmware runs after it, and must stay binary-stable across loader builds
//! sharing the same `version`.
//!
//! The C-era shape of this contract was a `bootloader_interface_t` of raw
//! function pointers taking a five-entry callback table
//! (`open/close/read/erase/write`, each non-null). The callback table is
//! the [`FlashAccess`] trait here; the interface table keeps its packed
//! layout and fixed address, but callers go through the version-checked
//! [`LoaderInterface::client`] accessor instead of dereferencing raw
//! pointers.

use crate::error::{Error, Result};
use crate::info::BootloaderInfo;
use crate::loader::access::FlashAccess;
use crate::loader::api;

/// Where the table lives in the MCU's address space
pub const LOADER_INTERFACE_ADDR: usize = 0x0800_0FC0;

/// Interface version this crate implements
pub const LOADER_INTERFACE_VERSION: u32 = 0x0010;

/// Signature of the mark-good entry point
pub type MarkFwGoodFn = fn(&mut dyn FlashAccess) -> Result<()>;

/// Signature of the read-info entry point
pub type ReadLoaderInfoFn = fn(&mut dyn FlashAccess, &mut BootloaderInfo) -> Result<()>;

/// Functions and information provided by the resident loader.
#[repr(C)]
pub struct LoaderInterface {
    /// Version of the loader; check it before calling anything else
    pub version: u32,
    /// Marks the currently selected firmware as good
    pub mark_fw_good: MarkFwGoodFn,
    /// Reads the info block out of flash
    pub read_loader_info: ReadLoaderInfoFn,
}

/// The table exported by this loader build, placed by the linker script at
/// [`LOADER_INTERFACE_ADDR`].
#[cfg_attr(target_os = "none", link_section = ".loaderinfo")]
#[used]
pub static LOADER_INTERFACE: LoaderInterface = LoaderInterface {
    version: LOADER_INTERFACE_VERSION,
    mark_fw_good: mark_fw_good_entry,
    read_loader_info: read_loader_info_entry,
};

fn mark_fw_good_entry(access: &mut dyn FlashAccess) -> Result<()> {
    api::mark_fw_good(access)
}

fn read_loader_info_entry(access: &mut dyn FlashAccess, info: &mut BootloaderInfo) -> Result<()> {
    api::read_loader_info(access, info)
}

impl LoaderInterface {
    /// Borrow the table at a fixed address.
    ///
    /// # Safety
    ///
    /// `addr` must point at a live, correctly laid-out `LoaderInterface`
    /// that outlives the returned reference - in practice,
    /// [`LOADER_INTERFACE_ADDR`] on a device flashed with a matching
    /// loader.
    pub unsafe fn from_addr<'a>(addr: usize) -> &'a LoaderInterface {
        &*(addr as *const LoaderInterface)
    }

    /// Version-checked access to the table's entry points.
    ///
    /// A version unknown to this crate is a hard incompatibility: no
    /// function pointer is reachable through the returned error.
    pub fn client(&self) -> Result<LoaderClient<'_>> {
        if self.version != LOADER_INTERFACE_VERSION {
            return Err(Error::VersionMismatch);
        }
        Ok(LoaderClient { table: self })
    }
}

/// Checked handle to a [`LoaderInterface`]
pub struct LoaderClient<'a> {
    table: &'a LoaderInterface,
}

impl LoaderClient<'_> {
    /// Marks the currently selected firmware as good
    pub fn mark_fw_good(&self, access: &mut dyn FlashAccess) -> Result<()> {
        (self.table.mark_fw_good)(access)
    }

    /// Reads the info block out of flash
    pub fn read_loader_info(
        &self,
        access: &mut dyn FlashAccess,
        info: &mut BootloaderInfo,
    ) -> Result<()> {
        (self.table.read_loader_info)(access, info)
    }
}
