//! Core domain types
//!
//! This module contains the structures shared by the batch engine (which
//! mutates execution records), the orchestrator (which persists them) and the
//! CLI (which displays them).

pub mod execution;
pub mod parameters;
pub mod report;
