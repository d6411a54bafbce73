//! Tally Report
//!
//! The sales report import job.
//!
//! This crate contains:
//! - A reader for tab-delimited sales reports
//! - The processor validating amounts and computing totals
//! - The Postgres writer, the table-clearing tasklet and the audit listener
//! - The job factory wiring them into `import-report-job`

pub mod error;
pub mod job;
pub mod listener;
pub mod processor;
pub mod reader;
pub mod tasklet;
pub mod writer;

pub use error::ReportError;
pub use job::{JOB_NAME, ReportJobConfig, ReportJobFactory, check_job};
pub use listener::ReportImportListener;
pub use processor::TotalCalculatingProcessor;
pub use reader::TsvReportReader;
pub use tasklet::ClearReportTableTasklet;
pub use writer::PgReportWriter;
