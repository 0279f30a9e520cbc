//! Flash capability surface
//!
//! The info-block routines never talk to a concrete transport; they run
//! against this trait. At boot time the loader supplies its own direct-SPI
//! implementation ([`crate::flash::SpiNorFlash`]); after handoff, client
//! firmware may substitute a different one (e.g. cached) when it re-enters
//! the loader's routines. Because the capability is an owned object passed
//! by `&mut`, swapping implementations is atomic by construction - there is
//! no partially-overwritten global table.

use crate::error::Result;

/// The five flash operations the loader routines need.
///
/// `read` fills the whole buffer or fails; `erase` covers whole erase
/// blocks containing the given range; `write` programs at most one page
/// into a previously erased region.
pub trait FlashAccess {
    /// Open the flash for reading/writing
    fn open(&mut self) -> Result<()>;

    /// Close the flash
    fn close(&mut self) -> Result<()>;

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Erase the area covering `len` bytes at `addr`
    fn erase(&mut self, addr: u32, len: usize) -> Result<()>;

    /// Write `data` at `addr`; the target must be erased first
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;
}

impl<A: FlashAccess + ?Sized> FlashAccess for &mut A {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn erase(&mut self, addr: u32, len: usize) -> Result<()> {
        (**self).erase(addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }
}
