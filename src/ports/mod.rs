//! Ports - Trait definitions for everything outside the domain.

pub mod engines;
pub mod events;
pub mod queue;
pub mod repository;
pub mod storage;
