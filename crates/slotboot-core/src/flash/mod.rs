//! Bulk operations over one serial NOR flash part
//!
//! [`SpiNorFlash`] owns a transport and sequences whole-region reads,
//! single-page writes, sector-chunked erases and the separately addressed
//! security register space.

use log::info;

use crate::error::Result;
use crate::loader::access::FlashAccess;
use crate::protocol::{self, PollConfig};
use crate::spi::{opcodes, StatusRegister};
use crate::transport::SpiTransport;

/// Smallest erase unit of the main array
pub const SECTOR_SIZE: usize = 4096;

/// The security register space is 14-bit addressed
const SECURITY_ADDR_MASK: u32 = 0x3FFF;

/// One serial NOR flash part behind a byte-level transport.
pub struct SpiNorFlash<T: SpiTransport> {
    transport: T,
    poll: PollConfig,
}

impl<T: SpiTransport> SpiNorFlash<T> {
    /// Wrap a transport with the default busy-poll configuration
    pub fn new(transport: T) -> Self {
        Self::with_poll_config(transport, PollConfig::default())
    }

    /// Wrap a transport with an explicit busy-poll configuration
    pub fn with_poll_config(transport: T, poll: PollConfig) -> Self {
        Self { transport, poll }
    }

    /// Access the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the device, returning the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// The busy-poll configuration in use
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Identify the chip: wait for idle, then read and log the JEDEC ID.
    pub fn probe(&mut self) -> Result<()> {
        protocol::wait_for_idle(&mut self.transport, &self.poll)?;
        let (manufacturer, device) = protocol::read_jedec_id(&mut self.transport)?;
        info!("flash ID: {:02X} {:04X}", manufacturer, device);
        Ok(())
    }

    /// Read the composite status register
    pub fn status(&mut self) -> Result<StatusRegister> {
        protocol::read_status(&mut self.transport)
    }

    /// Block until the chip reports idle
    pub fn wait_for_idle(&mut self) -> Result<()> {
        protocol::wait_for_idle(&mut self.transport, &self.poll)
    }

    /// Read `buf.len()` bytes from the main array starting at `addr`
    pub fn read_region(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        protocol::read_bytes(&mut self.transport, &self.poll, opcodes::FAST_READ, addr, buf)
    }

    /// Read from the security register space
    pub fn read_security_register(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        protocol::read_bytes(
            &mut self.transport,
            &self.poll,
            opcodes::RDSR_SEC,
            addr & SECURITY_ADDR_MASK,
            buf,
        )
    }

    /// Program up to one page of the main array at `addr`.
    ///
    /// The target page must have been erased first. See
    /// [`protocol::program_page`] for the page-wrap edge case.
    pub fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        protocol::program_page(&mut self.transport, &self.poll, opcodes::PP, addr, data)
    }

    /// Program up to one page in the security register space
    pub fn write_security_register(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        protocol::program_page(
            &mut self.transport,
            &self.poll,
            opcodes::PRSR,
            addr & SECURITY_ADDR_MASK,
            data,
        )
    }

    /// Erase the sectors covering `n_bytes` starting at `addr`.
    ///
    /// `addr` is aligned down to the nearest 4 KiB boundary and
    /// `ceil(n_bytes / 4096)` sectors are erased sequentially. Zero bytes is
    /// a no-op success. On the first failing sector the remaining chunks are
    /// abandoned and the error propagated; already-erased sectors stay
    /// erased.
    pub fn erase_region(&mut self, addr: u32, n_bytes: usize) -> Result<()> {
        // align to a 4K sector within the 24-bit address space
        let mut addr = addr & 0x00FF_F000;

        let sectors = n_bytes.div_ceil(SECTOR_SIZE);
        for _ in 0..sectors {
            protocol::erase_block(&mut self.transport, &self.poll, opcodes::SE_20, addr)?;
            addr += SECTOR_SIZE as u32;
        }

        Ok(())
    }

    /// Erase the security register containing `addr`.
    ///
    /// The security register opcode space is distinct from the main array
    /// and never mixed with it.
    pub fn erase_security_register(&mut self, addr: u32) -> Result<()> {
        protocol::erase_block(
            &mut self.transport,
            &self.poll,
            opcodes::ERSR,
            addr & SECURITY_ADDR_MASK,
        )
    }
}

/// The loader's own flash capability: direct SPI.
///
/// `write` is a single-page write; callers pre-split multi-page records.
/// `erase` covers whole sectors per [`SpiNorFlash::erase_region`].
impl<T: SpiTransport> FlashAccess for SpiNorFlash<T> {
    fn open(&mut self) -> Result<()> {
        self.transport.open()
    }

    fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.read_region(addr, buf)
    }

    fn erase(&mut self, addr: u32, len: usize) -> Result<()> {
        self.erase_region(addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.write_page(addr, data)
    }
}
