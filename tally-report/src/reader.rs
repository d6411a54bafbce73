//! Tab-delimited sales report reader
//!
//! Each line holds five fields in fixed order, separated by a tab:
//! `region_id outlet_id smartphones memory_cards notebooks`. There is no
//! header row. Blank lines are ignored.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tally_core::domain::report::SalesRecord;
use tally_engine::{ItemError, ItemReader};

use crate::error::ReportError;

const FIELD_COUNT: usize = 5;

/// Name under which the reader reports its problems
pub const READER_NAME: &str = "csv-reader";

pub struct TsvReportReader<R> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl TsvReportReader<File> {
    /// Opens the report at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let reader = builder()
            .from_path(path)
            .map_err(|source| ReportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::with_reader(reader))
    }
}

impl<R: io::Read> TsvReportReader<R> {
    pub fn from_reader(input: R) -> Self {
        Self::with_reader(builder().from_reader(input))
    }

    fn with_reader(reader: csv::Reader<R>) -> Self {
        Self {
            reader,
            record: StringRecord::new(),
        }
    }
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All);
    builder
}

fn parse_record(record: &StringRecord, line: u64) -> Result<SalesRecord, ItemError> {
    if record.len() != FIELD_COUNT {
        return Err(ItemError::malformed(format!(
            "{}: line {}: expected {} fields, found {}",
            READER_NAME,
            line,
            FIELD_COUNT,
            record.len()
        )));
    }

    let integer = |index: usize, name: &str| {
        record[index].parse::<i64>().map_err(|_| {
            ItemError::malformed(format!(
                "{}: line {}: {} is not an integer: '{}'",
                READER_NAME, line, name, &record[index]
            ))
        })
    };
    let decimal = |index: usize, name: &str| {
        BigDecimal::from_str(&record[index]).map_err(|_| {
            ItemError::malformed(format!(
                "{}: line {}: {} is not a decimal: '{}'",
                READER_NAME, line, name, &record[index]
            ))
        })
    };

    Ok(SalesRecord {
        region_id: integer(0, "region_id")?,
        outlet_id: integer(1, "outlet_id")?,
        smartphones: decimal(2, "smartphones")?,
        memory_cards: decimal(3, "memory_cards")?,
        notebooks: decimal(4, "notebooks")?,
    })
}

#[async_trait]
impl<R: io::Read + Send> ItemReader<SalesRecord> for TsvReportReader<R> {
    async fn read(&mut self) -> Result<Option<SalesRecord>, ItemError> {
        let has_record = self.reader.read_record(&mut self.record).map_err(|e| {
            if e.is_io_error() {
                ItemError::io(format!("{}: {}", READER_NAME, e))
            } else {
                ItemError::malformed(format!("{}: {}", READER_NAME, e))
            }
        })?;
        if !has_record {
            return Ok(None);
        }

        let line = self.record.position().map(|p| p.line()).unwrap_or(0);
        parse_record(&self.record, line).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_engine::ErrorKind;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn test_reads_records_in_order() {
        let input = "1\t10\t5.0\t2.0\t3.0\n2\t10\t4.0\t4.0\t4.0\n";
        let mut reader = TsvReportReader::from_reader(input.as_bytes());

        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(first.region_id, 1);
        assert_eq!(first.outlet_id, 10);
        assert_eq!(first.smartphones, dec("5.0"));
        assert_eq!(first.memory_cards, dec("2.0"));
        assert_eq!(first.notebooks, dec("3.0"));

        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(second.region_id, 2);
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_values_are_read() {
        let mut reader = TsvReportReader::from_reader("1\t11\t-1.0\t0.0\t0.0".as_bytes());

        let record = reader.read().await.unwrap().unwrap();
        assert_eq!(record.smartphones, dec("-1.0"));
    }

    #[tokio::test]
    async fn test_blank_lines_and_padding() {
        let input = "\n 3 \t 7\t1\t2\t3 \n\n";
        let mut reader = TsvReportReader::from_reader(input.as_bytes());

        let record = reader.read().await.unwrap().unwrap();
        assert_eq!((record.region_id, record.outlet_id), (3, 7));
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_field_count_is_malformed() {
        let input = "1\t10\t5.0\t2.0\t3.0\n1\t10\t5.0\n";
        let mut reader = TsvReportReader::from_reader(input.as_bytes());
        reader.read().await.unwrap();

        let err = reader.read().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
        assert!(err.message.contains("line 2"));
        assert!(err.message.contains("expected 5 fields, found 3"));
    }

    #[tokio::test]
    async fn test_unparsable_number_is_malformed() {
        let mut reader = TsvReportReader::from_reader("1\tten\t5.0\t2.0\t3.0".as_bytes());

        let err = reader.read().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
        assert!(err.message.contains("outlet_id is not an integer"));
    }

    #[test]
    fn test_missing_file() {
        let result = TsvReportReader::from_path("/nonexistent/report_data.csv");
        assert!(matches!(result, Err(ReportError::Open { .. })));
    }
}
