//! In-memory NOR flash emulator
//!
//! [`DummyFlash`] implements [`SpiTransport`] by decoding the byte stream a
//! transaction at a time, the way a real chip's command decoder does: an
//! opcode latched at the start of each chip-select bracket, address and dummy
//! bytes collected, then data streamed in or out. Programs only clear bits,
//! erases set them, the write-enable latch gates both, and a configurable
//! number of busy status polls follows every committed program or erase.
//!
//! Fault injection covers the cases the protocol layer has to survive:
//! failing status reads and a transport that dies mid-transfer.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use log::{debug, warn};

#[cfg(feature = "alloc")]
use slotboot_core::error::{Error, Result};
#[cfg(feature = "alloc")]
use slotboot_core::spi::opcodes;
#[cfg(feature = "alloc")]
use slotboot_core::transport::SpiTransport;

/// Size of the security register space (14-bit addressed)
#[cfg(feature = "alloc")]
const SECURITY_SIZE: usize = 0x4000;

/// Emulated chip geometry and identity.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Main array size in bytes
    pub size: usize,
    /// Program page size
    pub page_size: usize,
    /// Smallest erase unit
    pub sector_size: usize,
    /// Bytes returned for the JEDEC ID command
    pub jedec_id: [u8; 3],
    /// How many status polls report busy after a committed program or erase
    pub busy_polls_after_write: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            // W25Q16-ish: 2 MiB, 256 byte pages, 4 KiB sectors
            size: 2 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            jedec_id: [0xEF, 0x40, 0x15],
            busy_polls_after_write: 2,
        }
    }
}

/// Which byte array a command targets
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Main,
    Security,
}

/// Decoder state within the current chip-select bracket
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy)]
enum Xfer {
    /// Waiting for the opcode byte
    AwaitOpcode,
    /// Collecting the 3 big-endian address bytes
    CollectAddr { opcode: u8, bytes: [u8; 3], got: u8 },
    /// One dummy byte to swallow before data streams out
    Dummy { space: Space, addr: usize },
    /// Streaming data out
    Read { space: Space, addr: usize },
    /// Latching program data, wrapping within one page
    Program {
        space: Space,
        page_base: usize,
        offset: usize,
        any: bool,
    },
    /// Erase latched, committed when chip select deasserts
    ErasePending { opcode: u8, addr: usize },
    /// Streaming a status register out
    StatusRead { reg: u8 },
    /// Cycling the JEDEC ID bytes out
    IdRead { idx: usize },
    /// Rest of the bracket is ignored
    Ignored,
}

#[cfg(feature = "alloc")]
/// In-memory NOR flash chip behind the byte-level transport.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    security: Vec<u8>,
    opened: bool,
    in_transaction: bool,
    write_enabled: bool,
    busy_polls: u32,
    exchanged: usize,
    fail_status_reads: bool,
    fail_exchange_after: Option<usize>,
    state: Xfer,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// A fully erased chip with the given geometry
    pub fn new(config: DummyConfig) -> Self {
        let size = config.size;
        Self {
            config,
            data: vec![0xFF; size],
            security: vec![0xFF; SECURITY_SIZE],
            opened: false,
            in_transaction: false,
            write_enabled: false,
            busy_polls: 0,
            exchanged: 0,
            fail_status_reads: false,
            fail_exchange_after: None,
            state: Xfer::AwaitOpcode,
        }
    }

    /// A fully erased chip with the default geometry
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// The main array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the main array, for seeding test images
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The security register space contents
    pub fn security_data(&self) -> &[u8] {
        &self.security
    }

    /// Total bytes exchanged over the bus so far
    pub fn exchanged_bytes(&self) -> usize {
        self.exchanged
    }

    /// Whether the transport is currently open
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Make every status register read fail at the transport level
    pub fn set_fail_status_reads(&mut self, fail: bool) {
        self.fail_status_reads = fail;
    }

    /// Fail every exchange from the `n`-th byte onward
    pub fn fail_exchange_after(&mut self, n: usize) {
        self.fail_exchange_after = Some(n);
    }

    /// Status register 1 as the chip would report it, consuming one busy
    /// poll if an operation is still "in progress".
    fn status1(&mut self) -> u8 {
        let mut sr1 = 0u8;
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            sr1 |= opcodes::SR1_WIP;
        }
        if self.write_enabled {
            sr1 |= opcodes::SR1_WEL;
        }
        sr1
    }

    /// Decode the opcode byte that opens a bracket.
    fn decode_opcode(&mut self, opcode: u8) -> Result<u8> {
        // A chip mid-program or mid-erase only answers status reads.
        if self.busy_polls > 0
            && !matches!(opcode, opcodes::RDSR | opcodes::RDSR2 | opcodes::RDID)
        {
            warn!("opcode 0x{:02X} ignored while busy", opcode);
            self.state = Xfer::Ignored;
            return Ok(0xFF);
        }

        match opcode {
            opcodes::WREN => {
                self.write_enabled = true;
                self.state = Xfer::Ignored;
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                self.state = Xfer::Ignored;
            }
            opcodes::RDSR => {
                if self.fail_status_reads {
                    return Err(Error::SpiTransferFailed);
                }
                self.state = Xfer::StatusRead { reg: 1 };
            }
            opcodes::RDSR2 => {
                if self.fail_status_reads {
                    return Err(Error::SpiTransferFailed);
                }
                self.state = Xfer::StatusRead { reg: 2 };
            }
            opcodes::RDID => {
                self.state = Xfer::IdRead { idx: 0 };
            }
            opcodes::FAST_READ
            | opcodes::RDSR_SEC
            | opcodes::PP
            | opcodes::PRSR
            | opcodes::SE_20
            | opcodes::ERSR => {
                self.state = Xfer::CollectAddr {
                    opcode,
                    bytes: [0; 3],
                    got: 0,
                };
            }
            other => {
                warn!("unsupported opcode 0x{:02X}", other);
                self.state = Xfer::Ignored;
            }
        }

        Ok(0xFF)
    }

    /// An address just finished collecting; pick the data phase.
    fn start_data_phase(&mut self, opcode: u8, addr: u32) {
        let page_mask = self.config.page_size - 1;
        match opcode {
            opcodes::FAST_READ => {
                self.state = Xfer::Dummy {
                    space: Space::Main,
                    addr: addr as usize % self.config.size,
                };
            }
            opcodes::RDSR_SEC => {
                self.state = Xfer::Dummy {
                    space: Space::Security,
                    addr: addr as usize % SECURITY_SIZE,
                };
            }
            opcodes::PP | opcodes::PRSR => {
                if !self.write_enabled {
                    warn!("program without write enable, ignoring");
                    self.state = Xfer::Ignored;
                    return;
                }
                let (space, addr) = if opcode == opcodes::PP {
                    (Space::Main, addr as usize % self.config.size)
                } else {
                    (Space::Security, addr as usize % SECURITY_SIZE)
                };
                self.state = Xfer::Program {
                    space,
                    page_base: addr & !page_mask,
                    offset: addr & page_mask,
                    any: false,
                };
            }
            opcodes::SE_20 | opcodes::ERSR => {
                self.state = Xfer::ErasePending {
                    opcode,
                    addr: addr as usize,
                };
            }
            _ => unreachable!("non-addressed opcode in address phase"),
        }
    }

    /// Commit whatever the closing bracket latched.
    fn commit(&mut self) {
        match self.state {
            Xfer::Program { any: true, .. } => {
                self.write_enabled = false;
                self.busy_polls = self.config.busy_polls_after_write;
            }
            Xfer::ErasePending { opcode, addr } => {
                if !self.write_enabled {
                    warn!("erase without write enable, ignoring");
                    return;
                }
                match opcode {
                    opcodes::SE_20 => {
                        let sector = self.config.sector_size;
                        let base = (addr % self.config.size) & !(sector - 1);
                        debug!("erase sector @ 0x{:06X}", base);
                        for byte in &mut self.data[base..base + sector] {
                            *byte = 0xFF;
                        }
                    }
                    opcodes::ERSR => {
                        let page = self.config.page_size;
                        let base = (addr % SECURITY_SIZE) & !(page - 1);
                        debug!("erase security register @ 0x{:04X}", base);
                        for byte in &mut self.security[base..base + page] {
                            *byte = 0xFF;
                        }
                    }
                    _ => {}
                }
                self.write_enabled = false;
                self.busy_polls = self.config.busy_polls_after_write;
            }
            _ => {}
        }
    }

    fn space_mut(&mut self, space: Space) -> &mut [u8] {
        match space {
            Space::Main => &mut self.data,
            Space::Security => &mut self.security,
        }
    }

    fn space_byte(&self, space: Space, addr: usize) -> u8 {
        match space {
            Space::Main => self.data[addr % self.data.len()],
            Space::Security => self.security[addr % self.security.len()],
        }
    }
}

#[cfg(feature = "alloc")]
impl SpiTransport for DummyFlash {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }

    fn begin_transaction(&mut self) {
        self.in_transaction = true;
        self.state = Xfer::AwaitOpcode;
    }

    fn end_transaction(&mut self) {
        self.commit();
        self.in_transaction = false;
        self.state = Xfer::AwaitOpcode;
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8> {
        if let Some(left) = self.fail_exchange_after.as_mut() {
            if *left == 0 {
                return Err(Error::SpiTransferFailed);
            }
            *left -= 1;
        }

        if !self.in_transaction {
            return Err(Error::SpiTransferFailed);
        }
        self.exchanged += 1;

        match self.state {
            Xfer::AwaitOpcode => self.decode_opcode(out),
            Xfer::CollectAddr {
                opcode,
                mut bytes,
                got,
            } => {
                bytes[got as usize] = out;
                if got == 2 {
                    let addr = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;
                    self.start_data_phase(opcode, addr);
                } else {
                    self.state = Xfer::CollectAddr {
                        opcode,
                        bytes,
                        got: got + 1,
                    };
                }
                Ok(0xFF)
            }
            Xfer::Dummy { space, addr } => {
                self.state = Xfer::Read { space, addr };
                Ok(0xFF)
            }
            Xfer::Read { space, addr } => {
                let byte = self.space_byte(space, addr);
                self.state = Xfer::Read {
                    space,
                    addr: addr + 1,
                };
                Ok(byte)
            }
            Xfer::Program {
                space,
                page_base,
                offset,
                ..
            } => {
                let page_mask = self.config.page_size - 1;
                // programming only clears bits, and wraps within the page
                self.space_mut(space)[page_base + offset] &= out;
                self.state = Xfer::Program {
                    space,
                    page_base,
                    offset: (offset + 1) & page_mask,
                    any: true,
                };
                Ok(0xFF)
            }
            Xfer::StatusRead { reg } => {
                let byte = if reg == 1 { self.status1() } else { 0x00 };
                Ok(byte)
            }
            Xfer::IdRead { idx } => {
                let byte = self.config.jedec_id[idx % 3];
                self.state = Xfer::IdRead { idx: idx + 1 };
                Ok(byte)
            }
            Xfer::ErasePending { .. } | Xfer::Ignored => Ok(0xFF),
        }
    }

    fn delay_us(&mut self, _us: u32) {}
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use slotboot_core::flash::SpiNorFlash;
    use slotboot_core::info::{BootloaderInfo, SLOT_UNUSED_VERSION};
    use slotboot_core::loader::api;
    use slotboot_core::loader::session::{BootSession, SelectionPolicy, BOOT_MARKER_ADDR};
    use slotboot_core::protocol::{self, BusyPolicy, PollConfig};
    use slotboot_core::spi::SpiCommand;
    use zerocopy::byteorder::U16;
    use zerocopy::{FromZeros, IntoBytes};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// A record with the first `versions.len()` slots provisioned
    fn record(versions: &[u16]) -> BootloaderInfo {
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

    /// Seed the info record directly into the chip's main array
    fn provision(chip: &mut DummyFlash, info: &BootloaderInfo) {
        let bytes = info.as_bytes();
        chip.data_mut()[..bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn probe_reads_the_jedec_id() {
        let mut chip = DummyFlash::new_default();
        let (manufacturer, device) = protocol::read_jedec_id(&mut chip).unwrap();
        assert_eq!(manufacturer, 0xEF);
        assert_eq!(device, 0x4015);
    }

    #[test]
    fn erase_write_read_round_trip() {
        init();
        let mut flash = SpiNorFlash::new(DummyFlash::new_default());
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];

        flash.erase_region(0x2000, payload.len()).unwrap();
        flash.write_page(0x2000, &payload).unwrap();

        let mut back = [0u8; 4];
        flash.read_region(0x2000, &mut back).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn program_wraps_within_the_page() {
        let mut flash = SpiNorFlash::new(DummyFlash::new_default());
        // 4 bytes starting 2 before the page boundary
        flash.write_page(0x10FE, &[0x11, 0x22, 0x33, 0x44]).unwrap();

        let chip = flash.into_inner();
        assert_eq!(chip.data()[0x10FE], 0x11);
        assert_eq!(chip.data()[0x10FF], 0x22);
        // the tail wraps to the start of the same page, not the next one
        assert_eq!(chip.data()[0x1000], 0x33);
        assert_eq!(chip.data()[0x1001], 0x44);
        assert_eq!(chip.data()[0x1100], 0xFF);
    }

    #[test]
    fn erase_covers_whole_sectors() {
        let mut chip = DummyFlash::new_default();
        for byte in chip.data_mut()[0..0x3000].iter_mut() {
            *byte = 0x00;
        }
        let mut flash = SpiNorFlash::new(chip);

        // one byte at an unaligned address erases its whole sector
        flash.erase_region(0x1001, 1).unwrap();

        let chip = flash.into_inner();
        assert_eq!(chip.data()[0x0FFF], 0x00);
        assert!(chip.data()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
        assert_eq!(chip.data()[0x2000], 0x00);
    }

    #[test]
    fn zero_length_erase_is_a_no_op() {
        let mut chip = DummyFlash::new_default();
        for byte in chip.data_mut()[0x1000..0x2000].iter_mut() {
            *byte = 0x00;
        }
        let mut flash = SpiNorFlash::new(chip);

        flash.erase_region(0x1000, 0).unwrap();
        assert!(flash.into_inner().data()[0x1000..0x2000]
            .iter()
            .all(|&b| b == 0x00));
    }

    #[test]
    fn oversized_write_never_touches_the_bus() {
        let mut flash = SpiNorFlash::new(DummyFlash::new_default());
        let too_big = [0u8; 260];

        assert_eq!(
            flash.write_page(0x0000, &too_big),
            Err(Error::InvalidArgument)
        );
        assert_eq!(flash.into_inner().exchanged_bytes(), 0);
    }

    #[test]
    fn write_enable_latch_guards_programs() {
        let mut chip = DummyFlash::new_default();
        // raw page program without a preceding WREN
        let mut cmd = SpiCommand::write_3b(opcodes::PP, 0x0000, &[0x00; 4]);
        protocol::execute(&mut chip, &mut cmd).unwrap();
        assert!(chip.data()[..4].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn bounded_poll_times_out_on_a_slow_chip() {
        let config = DummyConfig {
            busy_polls_after_write: 10,
            ..DummyConfig::default()
        };
        let bounded = PollConfig {
            max_polls: Some(3),
            ..PollConfig::default()
        };
        let mut flash = SpiNorFlash::with_poll_config(DummyFlash::new(config), bounded);

        flash.write_page(0x0000, &[0x00]).unwrap();
        assert_eq!(flash.wait_for_idle(), Err(Error::Timeout));

        // an unbounded wait rides out the remaining busy polls
        protocol::wait_for_idle(flash.transport_mut(), &PollConfig::default()).unwrap();
    }

    #[test]
    fn legacy_policy_reports_idle_when_status_reads_fail() {
        let mut chip = DummyFlash::new_default();
        chip.set_fail_status_reads(true);

        assert_eq!(protocol::is_busy(&mut chip, BusyPolicy::Legacy), Ok(false));
        assert_eq!(
            protocol::is_busy(&mut chip, BusyPolicy::Strict),
            Err(Error::SpiTransferFailed)
        );
    }

    #[test]
    fn transport_errors_propagate_out_of_info_reads() {
        let mut chip = DummyFlash::new_default();
        provision(&mut chip, &record(&[0x0001]));
        // enough budget to pass the idle poll, then die mid record read
        chip.fail_exchange_after(10);
        let mut flash = SpiNorFlash::new(chip);

        let mut out = BootloaderInfo::new_zeroed();
        let before = out;
        assert_eq!(
            api::read_loader_info(&mut flash, &mut out),
            Err(Error::SpiTransferFailed)
        );
        assert_eq!(out, before);
    }

    #[test]
    fn security_register_space_is_independent() {
        let mut flash = SpiNorFlash::new(DummyFlash::new_default());

        flash.write_security_register(0x1000, &[0x12, 0x34]).unwrap();
        let chip = flash.transport_mut();
        assert_eq!(&chip.security_data()[0x1000..0x1002], &[0x12, 0x34]);
        assert_eq!(chip.data()[0x1000], 0xFF);

        flash.erase_security_register(0x1000).unwrap();
        assert!(flash.transport_mut().security_data()[0x1000..0x1100]
            .iter()
            .all(|&b| b == 0xFF));
    }

    #[test]
    fn boot_session_confirms_and_charges_failures() {
        init();
        let mut chip = DummyFlash::new_default();
        let mut info = record(&[0x0001, 0x0002]);
        info.current_firmware = 0;
        info.failsafe_firmware = 1;
        provision(&mut chip, &info);
        let mut flash = SpiNorFlash::new(chip);
        let policy = SelectionPolicy::default();

        // first boot confirms
        let session = BootSession::begin(&mut flash, &policy).unwrap().unwrap();
        assert_eq!(session.slot, 0);
        session.confirm(&mut flash).unwrap();

        let mut out = BootloaderInfo::new_zeroed();
        api::read_loader_info(&mut flash, &mut out).unwrap();
        assert_eq!(out.fw_info[0].start_successes, 1);
        assert_eq!(out.fw_info[0].start_fails, 0);

        // second boot never confirms
        let session = BootSession::begin(&mut flash, &policy).unwrap().unwrap();
        assert_eq!(session.slot, 0);

        // third boot finds the pending marker and charges the failure
        let session = BootSession::begin(&mut flash, &policy).unwrap().unwrap();
        assert_eq!(session.slot, 0);
        api::read_loader_info(&mut flash, &mut out).unwrap();
        assert_eq!(out.fw_info[0].start_fails, 1);
        assert_eq!(out.fw_info[0].start_successes, 1);
    }

    #[test]
    fn boot_session_falls_back_to_the_failsafe() {
        init();
        let mut chip = DummyFlash::new_default();
        let mut info = record(&[0x0001, 0x0002]);
        info.current_firmware = 0;
        info.failsafe_firmware = 1;
        info.fw_info[0].start_fails = 4;
        provision(&mut chip, &info);
        let mut flash = SpiNorFlash::new(chip);

        let session = BootSession::begin(&mut flash, &SelectionPolicy::default())
            .unwrap()
            .unwrap();
        assert_eq!(session.slot, 1);

        // the record now names the failsafe as current
        let mut out = BootloaderInfo::new_zeroed();
        api::read_loader_info(&mut flash, &mut out).unwrap();
        assert_eq!(out.current_firmware, 1);
    }

    #[test]
    fn boot_session_halts_with_nothing_viable() {
        let mut chip = DummyFlash::new_default();
        let mut info = record(&[0x0001, 0x0002]);
        info.current_firmware = 0;
        info.failsafe_firmware = 1;
        info.fw_info[0].start_fails = 10;
        info.fw_info[1].start_fails = 10;
        provision(&mut chip, &info);
        let mut flash = SpiNorFlash::new(chip);

        let session = BootSession::begin(&mut flash, &SelectionPolicy::default()).unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn pending_marker_survives_in_security_space() {
        let mut chip = DummyFlash::new_default();
        let mut info = record(&[0x0001]);
        info.current_firmware = 0;
        provision(&mut chip, &info);
        let mut flash = SpiNorFlash::new(chip);

        let session = BootSession::begin(&mut flash, &SelectionPolicy::default())
            .unwrap()
            .unwrap();

        let mut marker = [0u8; 3];
        flash
            .read_security_register(BOOT_MARKER_ADDR, &mut marker)
            .unwrap();
        assert_eq!(marker, [0xA5, 0x00, 0xFF]);

        session.confirm(&mut flash).unwrap();
        flash
            .read_security_register(BOOT_MARKER_ADDR, &mut marker)
            .unwrap();
        assert_eq!(marker, [0xA5, 0x00, 0x00]);
    }
}
