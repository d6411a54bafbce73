use bigdecimal::{BigDecimal, Zero};
use tally_core::domain::report::{SalesRecord, SalesReportItem};
use tally_engine::{ItemError, ItemProcessor, ProcessOutcome};

/// Validates a sales record and attaches its total
///
/// A record with any negative amount is rejected as a validation failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TotalCalculatingProcessor;

impl ItemProcessor<SalesRecord, SalesReportItem> for TotalCalculatingProcessor {
    fn process(&self, record: SalesRecord) -> ProcessOutcome<SalesReportItem> {
        let negative = [
            ("smartphones", &record.smartphones),
            ("memory_cards", &record.memory_cards),
            ("notebooks", &record.notebooks),
        ]
        .into_iter()
        .find(|(_, value)| *value < &BigDecimal::zero());

        if let Some((field, value)) = negative {
            return ProcessOutcome::Rejected(ItemError::validation(format!(
                "region {} outlet {}: {} must not be negative, got {}",
                record.region_id, record.outlet_id, field, value
            )));
        }

        let total = &record.smartphones + &record.memory_cards + &record.notebooks;
        ProcessOutcome::Transformed(SalesReportItem::from_record(record, total))
    }
}
