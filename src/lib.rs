//! Cortex - Video analysis pipeline
//!
//! Turns an uploaded video into one time-aligned markdown report: speech,
//! on-screen text and frame captions are extracted by independent stages,
//! fused on a fixed-step timeline, then synthesized into a document.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, stages, timeline fusion)
//! - ports/: Trait definitions (queue, job records, storage, engines)
//! - adapters/: Concrete implementations (Redis, in-memory, filesystem,
//!   HTTP API and client, CLI and HTTP engines)
//! - application/: Services (orchestrator, pipeline, worker, polling)
//! - config: Environment configuration
//!
//! # Features
//! - `redis` (default): Redis-backed queue and job status store
//!
//! # Credentials
//! Collaborator secrets are never written to job records or artifacts. With
//! the Redis backend they are kept under a separate key that expires after a
//! day and is deleted once the job is acknowledged. Redis may still snapshot
//! that key to disk (RDB/AOF) while it lives; disable persistence or protect
//! the Redis data directory if that matters for your deployment.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use config::LocalConfig;
pub use domain::fusion;
