//! Loader-facing logic
//!
//! Everything above the raw flash device: the capability surface the
//! info-block routines run against, the routines themselves, the boot
//! attempt state machine, and the fixed-address interface table exposed to
//! client firmware.

pub mod access;
pub mod api;
pub mod interface;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;
