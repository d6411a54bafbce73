//! Sales report domain types

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// One line of a sales report as read from the source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub region_id: i64,
    pub outlet_id: i64,
    pub smartphones: BigDecimal,
    pub memory_cards: BigDecimal,
    pub notebooks: BigDecimal,
}

/// A validated sales record with its computed total
///
/// Maps one to one onto a row of the `sales_report` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesReportItem {
    pub region_id: i64,
    pub outlet_id: i64,
    pub smartphones: BigDecimal,
    pub memory_cards: BigDecimal,
    pub notebooks: BigDecimal,
    pub total: BigDecimal,
}

impl SalesReportItem {
    pub fn from_record(record: SalesRecord, total: BigDecimal) -> Self {
        Self {
            region_id: record.region_id,
            outlet_id: record.outlet_id,
            smartphones: record.smartphones,
            memory_cards: record.memory_cards,
            notebooks: record.notebooks,
            total,
        }
    }
}
