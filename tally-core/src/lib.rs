//! Tally Core
//!
//! Core types shared by the Tally batch services.
//!
//! This crate contains:
//! - Domain types: execution records, run parameters, sales report items
//! - DTOs: Data transfer objects exchanged between the orchestrator and its clients

pub mod domain;
pub mod dto;
