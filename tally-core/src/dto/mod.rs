//! Data Transfer Objects
//!
//! Lightweight payloads exchanged over the orchestrator HTTP API.

pub mod job;
