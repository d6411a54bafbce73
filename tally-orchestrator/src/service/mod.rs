//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between the batch engine and the repositories.

pub mod job;

// Re-export for convenience
pub use job as job_service;
