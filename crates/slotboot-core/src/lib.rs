//! slotboot-core - Second-stage bootloader core
//!
//! This crate provides the core functionality of a minimal second-stage
//! bootloader that keeps several firmware images in external serial NOR
//! flash, tracks their boot health, and decides which image is safe to run.
//! It is `no_std` compatible for use on the target MCU; the same code runs
//! on the host against an emulated flash chip for testing.
//!
//! # Layers
//!
//! - [`transport`] - byte-level duplex SPI link with chip-select bracketing
//! - [`protocol`] - NOR flash command framing, status and busy-poll sequencing
//! - [`flash`] - bulk region operations over one flash part
//! - [`info`] - the persisted bootloader info block (firmware slots, health counters)
//! - [`loader`] - the loader API, boot-attempt state machine, and the
//!   fixed-address interface table exposed to client firmware
//!
//! # Example
//!
//! ```ignore
//! use slotboot_core::flash::SpiNorFlash;
//! use slotboot_core::loader::session::{BootSession, SelectionPolicy};
//!
//! fn boot<T: slotboot_core::transport::SpiTransport>(transport: T) -> ! {
//!     let mut flash = SpiNorFlash::new(transport);
//!     match BootSession::begin(&mut flash, &SelectionPolicy::default()) {
//!         Ok(Some(session)) => jump_to_slot(session.slot),
//!         Ok(None) => halt(),  // no viable image
//!         Err(_) => halt(),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod flash;
pub mod info;
pub mod loader;
pub mod protocol;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};
