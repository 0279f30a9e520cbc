//! Flash command protocol
//!
//! Builds chip command frames on top of a [`crate::transport::SpiTransport`]
//! and sequences write-enable, program/erase and busy-polling.

mod nor;

pub use nor::*;
