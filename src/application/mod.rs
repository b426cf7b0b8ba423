//! Application layer - Services that drive the domain through ports.

pub mod artifacts;
pub mod orchestrator;
pub mod pipeline;
pub mod polling;
pub mod speech;
pub mod stages;
pub mod worker;
