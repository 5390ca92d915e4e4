//! Adapter implementations of the mirror task repository port.

pub mod memory;
pub mod postgres;
