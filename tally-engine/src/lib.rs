//! Tally Engine
//!
//! Chunk-oriented batch execution engine.
//!
//! This crate contains:
//! - Item capabilities: readers, processors, writers and tasklets
//! - Skip policies and the chunk pipeline
//! - Step and job executors with their lifecycle listeners
//! - The execution-history repository and the job launcher

pub mod chunk;
pub mod error;
pub mod item;
pub mod job;
pub mod launcher;
pub mod listener;
pub mod repository;
pub mod skip;
pub mod step;

pub use error::{BatchError, ErrorKind, ItemError};
pub use item::{ItemProcessor, ItemReader, ItemWriter, ProcessOutcome, Tasklet};
pub use job::{JobBuilder, JobDefinition, JobExecutor, JobFactory};
pub use launcher::JobLauncher;
pub use listener::JobExecutionListener;
pub use repository::{InMemoryJobRepository, JobRepository};
pub use skip::{LimitCheckingSkipPolicy, SkipPolicy};
pub use step::{ChunkStep, ChunkStepBuilder, Step, StepExecutor, TaskletStep};
