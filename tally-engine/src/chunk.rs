//! Chunk-oriented processing
//!
//! One call to [`run_chunk`] performs one read-process-write cycle:
//! 1. Read up to `chunk_size` items, stopping early when the source is exhausted
//! 2. Process each item; rejected items go through the skip policy
//! 3. Commit the surviving items to the writer as one batch
//!
//! A fatal error anywhere in the cycle returns before the commit, so nothing
//! of the current chunk reaches the writer.

use tally_core::domain::execution::StepExecution;
use tracing::debug;

use crate::error::BatchError;
use crate::item::{ItemProcessor, ItemReader, ItemWriter, ProcessOutcome};
use crate::skip::{SkipCounter, SkipPolicy};

/// Surviving items of one cycle
///
/// Never holds more than its capacity and is dropped after the cycle.
#[derive(Debug)]
pub struct Chunk<O> {
    items: Vec<O>,
    capacity: usize,
}

impl<O> Chunk<O> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: O) {
        debug_assert!(self.items.len() < self.capacity, "chunk over capacity");
        self.items.push(item);
    }

    pub fn items(&self) -> &[O] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Counter deltas produced by one cycle
///
/// Filled in as the cycle progresses, so a failed cycle still reports what it
/// read and skipped before the failure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepContribution {
    pub read_count: u64,
    pub filter_count: u64,
    pub read_skip_count: u64,
    pub process_skip_count: u64,
    pub write_count: u64,
    pub commit_count: u64,
}

impl StepContribution {
    pub fn apply_to(&self, execution: &mut StepExecution) {
        execution.read_count += self.read_count;
        execution.filter_count += self.filter_count;
        execution.read_skip_count += self.read_skip_count;
        execution.process_skip_count += self.process_skip_count;
        execution.write_count += self.write_count;
        execution.commit_count += self.commit_count;
    }
}

/// Result of a successful cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkResult {
    pub items_written: usize,
    pub items_skipped: usize,
    /// The source reported exhaustion during this cycle
    pub exhausted: bool,
}

/// Runs one read-process-write cycle
#[allow(clippy::too_many_arguments)]
pub async fn run_chunk<I, O>(
    reader: &mut dyn ItemReader<I>,
    processor: &dyn ItemProcessor<I, O>,
    writer: &mut dyn ItemWriter<O>,
    policy: &dyn SkipPolicy,
    counter: &mut SkipCounter,
    chunk_size: usize,
    contribution: &mut StepContribution,
) -> Result<ChunkResult, BatchError>
where
    I: Send,
    O: Send + Sync,
{
    let mut chunk = Chunk::with_capacity(chunk_size);
    let mut result = ChunkResult::default();

    for _ in 0..chunk_size {
        let item = match reader.read().await {
            Ok(Some(item)) => item,
            Ok(None) => {
                result.exhausted = true;
                break;
            }
            Err(err) => {
                counter.try_skip(policy, err)?;
                contribution.read_skip_count += 1;
                result.items_skipped += 1;
                continue;
            }
        };
        contribution.read_count += 1;

        match processor.process(item) {
            ProcessOutcome::Transformed(output) => chunk.push(output),
            ProcessOutcome::Filtered => contribution.filter_count += 1,
            ProcessOutcome::Rejected(err) => {
                counter.try_skip(policy, err)?;
                contribution.process_skip_count += 1;
                result.items_skipped += 1;
            }
        }
    }

    if !chunk.is_empty() {
        writer.write(chunk.items()).await.map_err(BatchError::Write)?;
        contribution.write_count += chunk.len() as u64;
        contribution.commit_count += 1;
        result.items_written = chunk.len();
        debug!("Committed chunk of {} item(s)", chunk.len());
    }

    Ok(result)
}
