//! SPI command structure

/// Size of one program page. Writes never cross a page boundary; the chip
/// wraps within the page instead of spilling into the next one.
pub const PAGE_SIZE: usize = 256;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
///
/// Exactly one chip-select bracket is opened per executed command;
/// transactions do not nest.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any); only the low 24 bits are encoded on the wire
    pub address: Option<u32>,

    /// Number of dummy bytes clocked out after the address
    pub dummy_bytes: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a read command with 3-byte address (e.g., FAST_READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with 3-byte address
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Set the number of dummy bytes clocked out after the address
    pub fn with_dummy_bytes(mut self, n: u8) -> Self {
        self.dummy_bytes = n;
        self
    }

    /// The address phase, big-endian, 24 bits
    pub fn address_bytes(&self) -> Option<[u8; 3]> {
        self.address
            .map(|a| [(a >> 16) as u8, (a >> 8) as u8, a as u8])
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Total bytes clocked on the bus by this command
    pub fn total_bytes(&self) -> usize {
        let mut total = 1; // opcode
        if self.address.is_some() {
            total += 3;
        }
        total += self.dummy_bytes as usize;
        total += self.write_data.len();
        total += self.read_buf.len();
        total
    }
}
