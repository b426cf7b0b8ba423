//! Adapters - Concrete implementations of ports.

pub mod client;
pub mod engines;
pub mod local;
