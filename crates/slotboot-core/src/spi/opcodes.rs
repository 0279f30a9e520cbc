//! SPI flash opcodes used by the boot flash part
//!
//! The values are fixed by the chip and shared with the firmware build;
//! they must not change.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read commands
// ============================================================================

/// Fast Read (one dummy byte after the address)
pub const FAST_READ: u8 = 0x0B;
/// Read Security Register (one dummy byte after the address)
pub const RDSR_SEC: u8 = 0x48;

// ============================================================================
// Page Program
// ============================================================================

/// Page Program (up to 256 bytes within one page)
pub const PP: u8 = 0x02;
/// Program Security Register
pub const PRSR: u8 = 0x42;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4KB
pub const SE_20: u8 = 0x20;
/// Erase Security Register
pub const ERSR: u8 = 0x44;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
