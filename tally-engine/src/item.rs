//! Item capabilities
//!
//! The narrow interfaces a chunk step consumes:
//! - [`ItemReader`]: lazy, finite source of raw items
//! - [`ItemProcessor`]: maps one item to one item, or rejects it
//! - [`ItemWriter`]: persists a whole chunk atomically
//! - [`Tasklet`]: a single atomic operation run as its own step
//!
//! In-memory implementations ([`ListItemReader`], [`ListItemWriter`]) are
//! provided for dry runs and tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tally_core::domain::execution::StepExecution;

use crate::error::ItemError;

/// Source of items for a chunk step
///
/// Returns `Ok(None)` once exhausted. Readers are not restartable; a new
/// reader is built for every run.
#[async_trait]
pub trait ItemReader<I>: Send {
    async fn read(&mut self) -> Result<Option<I>, ItemError>;
}

/// Outcome of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome<O> {
    /// The item survives into the chunk
    Transformed(O),
    /// The item is dropped on purpose; not a skip
    Filtered,
    /// The item failed; the skip policy decides what happens next
    Rejected(ItemError),
}

/// Transforms items between reading and writing
pub trait ItemProcessor<I, O>: Send + Sync {
    fn process(&self, item: I) -> ProcessOutcome<O>;
}

impl<I, O, F> ItemProcessor<I, O> for F
where
    F: Fn(I) -> ProcessOutcome<O> + Send + Sync,
{
    fn process(&self, item: I) -> ProcessOutcome<O> {
        self(item)
    }
}

/// Processor that hands every item through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughProcessor;

impl<T> ItemProcessor<T, T> for PassThroughProcessor {
    fn process(&self, item: T) -> ProcessOutcome<T> {
        ProcessOutcome::Transformed(item)
    }
}

/// Destination of a chunk step
///
/// `write` receives a whole chunk and must persist all of it or none of it.
#[async_trait]
pub trait ItemWriter<O>: Send {
    async fn write(&mut self, items: &[O]) -> Result<(), ItemError>;
}

/// A single atomic operation executed as a step
///
/// Any error is fatal to the step.
#[async_trait]
pub trait Tasklet: Send {
    async fn execute(&mut self, step: &StepExecution) -> anyhow::Result<()>;
}

/// Reader over a prepared list of read results
pub struct ListItemReader<I> {
    items: VecDeque<Result<I, ItemError>>,
}

impl<I> ListItemReader<I> {
    pub fn new(items: impl IntoIterator<Item = I>) -> Self {
        Self {
            items: items.into_iter().map(Ok).collect(),
        }
    }

    /// Reader that also yields read errors at chosen positions
    pub fn from_results(items: impl IntoIterator<Item = Result<I, ItemError>>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<I: Send> ItemReader<I> for ListItemReader<I> {
    async fn read(&mut self) -> Result<Option<I>, ItemError> {
        self.items.pop_front().transpose()
    }
}

/// Writer that keeps every committed chunk in memory
///
/// Clones share the same storage, so a clone kept aside can inspect what the
/// step wrote.
pub struct ListItemWriter<O> {
    chunks: Arc<Mutex<Vec<Vec<O>>>>,
}

impl<O: Clone> ListItemWriter<O> {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Committed chunks in commit order
    pub fn chunks(&self) -> Vec<Vec<O>> {
        self.chunks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// All committed items, flattened
    pub fn items(&self) -> Vec<O> {
        self.chunks().into_iter().flatten().collect()
    }
}

impl<O: Clone> Default for ListItemWriter<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for ListItemWriter<O> {
    fn clone(&self) -> Self {
        Self {
            chunks: Arc::clone(&self.chunks),
        }
    }
}

#[async_trait]
impl<O: Clone + Send + Sync> ItemWriter<O> for ListItemWriter<O> {
    async fn write(&mut self, items: &[O]) -> Result<(), ItemError> {
        let mut chunks = self
            .chunks
            .lock()
            .map_err(|e| ItemError::write(format!("Failed to lock chunk buffer: {}", e)))?;
        chunks.push(items.to_vec());
        Ok(())
    }
}
