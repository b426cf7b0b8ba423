//! Domain layer - Pure business logic.

pub mod errors;
pub mod fusion;
pub mod jobs;
pub mod stage;
pub mod timeline;
