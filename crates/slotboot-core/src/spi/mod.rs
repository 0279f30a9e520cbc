//! SPI types and command structures
//!
//! This module provides the types for describing single NOR flash
//! transactions and the bit-exact command set of the boot flash part.

mod command;
pub mod opcodes;
mod status;

pub use command::{SpiCommand, PAGE_SIZE};
pub use status::StatusRegister;
