//! Repository Module
//!
//! Data access layer for the orchestrator.

pub mod execution;

// Re-export for convenience
pub use execution as execution_repository;
