//! Byte-level SPI transport
//!
//! The transport drives the physical duplex link: clock, chip-select framing
//! and full-duplex byte exchange. It is stateless apart from bus ownership;
//! callers batch bytes into commands at the [`crate::protocol`] layer.

use crate::error::Result;

/// A byte-oriented duplex serial link to the flash chip.
///
/// `begin_transaction`/`end_transaction` bracket one chip-select assertion
/// window. Exactly one bracket is open at a time; brackets do not nest.
/// All operations are synchronous and blocking - a wedged link blocks
/// forever, which is the accepted failure mode for a boot-time driver that
/// runs under a watchdog.
pub trait SpiTransport {
    /// Configure the physical link for exclusive use.
    fn open(&mut self) -> Result<()>;

    /// Release the link.
    fn close(&mut self) -> Result<()>;

    /// Assert the chip-select line, starting a transaction bracket.
    fn begin_transaction(&mut self);

    /// De-assert the chip-select line, ending the bracket.
    ///
    /// The chip latches program and erase commands on this edge; a write
    /// command and its data must therefore share one bracket.
    fn end_transaction(&mut self);

    /// Clock one byte out and return the byte clocked in.
    ///
    /// Blocks until the outbound buffer is ready and an inbound byte is
    /// available. No buffering beyond the single byte.
    fn exchange_byte(&mut self, out: u8) -> Result<u8>;

    /// Busy-wait for the given number of microseconds.
    ///
    /// Used between status polls while the chip is mid-operation.
    fn delay_us(&mut self, us: u32);
}

impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn begin_transaction(&mut self) {
        (**self).begin_transaction()
    }

    fn end_transaction(&mut self) {
        (**self).end_transaction()
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8> {
        (**self).exchange_byte(out)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
