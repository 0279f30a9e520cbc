//! NOR flash command sequences
//!
//! Each function frames one or more [`SpiCommand`]s over the transport. The
//! ordering rules come from the chip: every program/erase is preceded by a
//! wait-for-idle and a WREN, and a program command must share its
//! chip-select bracket with its payload or the chip aborts the operation.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiCommand, StatusRegister, PAGE_SIZE};
use crate::transport::SpiTransport;

/// What to do when the status read behind `is_busy` fails.
///
/// The legacy behavior reports "not busy" on a failed read, which can let a
/// command go out against a chip still mid-erase. It is preserved as the
/// default for compatibility; `Strict` propagates the error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Swallow status-read failures and report idle (legacy behavior)
    #[default]
    Legacy,
    /// Propagate status-read failures to the caller
    Strict,
}

/// Busy-poll configuration
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Idle delay between status polls, in microseconds
    pub poll_delay_us: u32,
    /// Maximum number of polls before giving up with [`Error::Timeout`];
    /// `None` polls forever (legacy behavior)
    pub max_polls: Option<u32>,
    /// Policy for failed status reads
    pub busy_policy: BusyPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_delay_us: 1_000,
            max_polls: None,
            busy_policy: BusyPolicy::default(),
        }
    }
}

/// Execute a single command within one chip-select bracket.
///
/// Frame order: opcode, 3 address bytes (big-endian) if present,
/// `dummy_bytes` zero bytes, the write payload, then one zero byte clocked
/// out per response byte wanted. The bracket is closed on every path.
pub fn execute<T: SpiTransport + ?Sized>(t: &mut T, cmd: &mut SpiCommand<'_>) -> Result<()> {
    t.begin_transaction();
    let res = execute_in_bracket(t, cmd);
    t.end_transaction();
    res
}

fn execute_in_bracket<T: SpiTransport + ?Sized>(
    t: &mut T,
    cmd: &mut SpiCommand<'_>,
) -> Result<()> {
    t.exchange_byte(cmd.opcode)?;

    if let Some(addr) = cmd.address_bytes() {
        for byte in addr {
            t.exchange_byte(byte)?;
        }
    }

    for _ in 0..cmd.dummy_bytes {
        t.exchange_byte(0x00)?;
    }

    for &byte in cmd.write_data {
        t.exchange_byte(byte)?;
    }

    for byte in cmd.read_buf.iter_mut() {
        *byte = t.exchange_byte(0x00)?;
    }

    Ok(())
}

/// Read the JEDEC ID from the chip.
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<T: SpiTransport + ?Sized>(t: &mut T) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    execute(t, &mut cmd)?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read the status register 1 (0x05)
pub fn read_status1<T: SpiTransport + ?Sized>(t: &mut T) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    execute(t, &mut cmd)?;
    Ok(buf[0])
}

/// Read the status register 2 (0x35)
pub fn read_status2<T: SpiTransport + ?Sized>(t: &mut T) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR2, &mut buf);
    execute(t, &mut cmd)?;
    Ok(buf[0])
}

/// Read both status registers as one composite value
pub fn read_status<T: SpiTransport + ?Sized>(t: &mut T) -> Result<StatusRegister> {
    let sr1 = read_status1(t)?;
    let sr2 = read_status2(t)?;
    Ok(StatusRegister::from_parts(sr1, sr2))
}

/// Send the Write Enable command
pub fn write_enable<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    execute(t, &mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<T: SpiTransport + ?Sized>(t: &mut T) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    execute(t, &mut cmd)
}

/// Check if a program or erase operation is in progress.
///
/// Under [`BusyPolicy::Legacy`] a failed status read is reported as "not
/// busy" with a warning; under [`BusyPolicy::Strict`] it is propagated.
pub fn is_busy<T: SpiTransport + ?Sized>(t: &mut T, policy: BusyPolicy) -> Result<bool> {
    match read_status1(t) {
        Ok(sr1) => Ok(sr1 & opcodes::SR1_WIP != 0),
        Err(e) => match policy {
            BusyPolicy::Strict => Err(e),
            BusyPolicy::Legacy => {
                warn!("status read failed ({}), reporting flash as idle", e);
                Ok(false)
            }
        },
    }
}

/// Wait until the chip is no longer busy.
///
/// Polls the status register with `cfg.poll_delay_us` of idle delay between
/// busy observations. With `max_polls: None` this spins until the chip
/// idles; with a bound it returns [`Error::Timeout`] once the budget is
/// spent.
pub fn wait_for_idle<T: SpiTransport + ?Sized>(t: &mut T, cfg: &PollConfig) -> Result<()> {
    let mut polls: u32 = 0;

    loop {
        if !is_busy(t, cfg.busy_policy)? {
            return Ok(());
        }

        polls = polls.saturating_add(1);
        if let Some(max) = cfg.max_polls {
            if polls >= max {
                return Err(Error::Timeout);
            }
        }

        t.delay_us(cfg.poll_delay_us);
    }
}

/// Read `buf.len()` bytes starting at `addr` using a fast-read class opcode.
///
/// The whole read stays inside a single chip-select bracket; unlike writes
/// there is no page limit on a single read.
pub fn read_bytes<T: SpiTransport + ?Sized>(
    t: &mut T,
    cfg: &PollConfig,
    opcode: u8,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    wait_for_idle(t, cfg)?;

    let mut cmd = SpiCommand::read_3b(opcode, addr, buf).with_dummy_bytes(1);
    execute(t, &mut cmd)
}

/// Program up to one page at `addr` with a page-program class opcode.
///
/// Sequencing: wait for idle, WREN, then opcode + address + payload inside
/// one bracket, then WRDI. Rejects payloads over [`PAGE_SIZE`] bytes before
/// touching the bus.
///
/// Chip edge case, callers beware: data that runs past a 256-byte page
/// boundary wraps to the start of the same page rather than spilling into
/// the next one. Multi-page writes must be pre-split.
pub fn program_page<T: SpiTransport + ?Sized>(
    t: &mut T,
    cfg: &PollConfig,
    opcode: u8,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if data.len() > PAGE_SIZE {
        return Err(Error::InvalidArgument);
    }

    wait_for_idle(t, cfg)?;
    write_enable(t)?;

    debug!("program {} bytes @ 0x{:06X}", data.len(), addr);
    let mut cmd = SpiCommand::write_3b(opcode, addr, data);
    execute(t, &mut cmd)?;

    write_disable(t)
}

/// Erase one aligned block at `addr` with an erase-class opcode.
///
/// Sequencing: wait for idle, WREN, single-bracket opcode + address, WRDI.
pub fn erase_block<T: SpiTransport + ?Sized>(
    t: &mut T,
    cfg: &PollConfig,
    opcode: u8,
    addr: u32,
) -> Result<()> {
    wait_for_idle(t, cfg)?;
    write_enable(t)?;

    debug!("erase block @ 0x{:06X} (opcode 0x{:02X})", addr, opcode);
    let mut cmd = SpiCommand::erase_3b(opcode, addr);
    execute(t, &mut cmd)?;

    write_disable(t)
}
