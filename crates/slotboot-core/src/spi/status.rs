//! Composite flash status register

use bitflags::bitflags;

bitflags! {
    /// 16-bit status value assembled from the chip's two 8-bit status
    /// registers: SR1 (opcode 0x05) in the low byte, SR2 (opcode 0x35)
    /// in the high byte. BUSY is bit 0 of the low byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister: u16 {
        /// Write In Progress - set while a program or erase is running
        const BUSY = 1 << 0;
        /// Write Enable Latch
        const WEL = 1 << 1;
        /// Block Protect bit 0
        const BP0 = 1 << 2;
        /// Block Protect bit 1
        const BP1 = 1 << 3;
        /// Block Protect bit 2
        const BP2 = 1 << 4;
        /// Top/Bottom Protect
        const TB = 1 << 5;
        /// Sector/Block Protect
        const SEC = 1 << 6;
        /// Status Register Protect 0
        const SRP0 = 1 << 7;
        /// Status Register Protect 1
        const SRP1 = 1 << 8;
        /// Quad Enable
        const QE = 1 << 9;
        /// Suspend Status
        const SUS = 1 << 15;
    }
}

impl StatusRegister {
    /// Assemble the composite value from the two raw register bytes
    pub fn from_parts(sr1: u8, sr2: u8) -> Self {
        Self::from_bits_retain(((sr2 as u16) << 8) | sr1 as u16)
    }

    /// Whether a program or erase operation is still in progress
    pub fn busy(&self) -> bool {
        self.contains(Self::BUSY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_bit_zero_of_the_low_byte() {
        assert!(StatusRegister::from_parts(0x01, 0x00).busy());
        assert!(!StatusRegister::from_parts(0x00, 0x01).busy());
    }

    #[test]
    fn parts_assemble_sr2_high() {
        let sr = StatusRegister::from_parts(0x03, 0x02);
        assert_eq!(sr.bits(), 0x0203);
        assert!(sr.contains(StatusRegister::WEL));
        assert!(sr.contains(StatusRegister::QE));
    }
}
