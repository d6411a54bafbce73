//! Postgres sink for the `sales_report` table

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tally_core::domain::report::SalesReportItem;
use tally_engine::{ItemError, ItemWriter};
use tracing::debug;

/// Inserts each chunk in a single transaction
///
/// Large chunks are split over several statements inside that transaction.
/// A failed insert drops the transaction uncommitted, so no row of the
/// chunk is left behind.
#[derive(Debug, Clone)]
pub struct PgReportWriter {
    pool: PgPool,
}

impl PgReportWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Postgres accepts at most `u16::MAX` bind parameters per statement
const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / 6;

/// One multi-row `INSERT` per batch of at most [`MAX_ROWS_PER_INSERT`] items
fn insert_queries(items: &[SalesReportItem]) -> impl Iterator<Item = QueryBuilder<'_, Postgres>> {
    items.chunks(MAX_ROWS_PER_INSERT).map(insert_query)
}

fn insert_query(items: &[SalesReportItem]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO sales_report (region_id, outlet_id, smartphones, memory_cards, notebooks, total) ",
    );
    builder.push_values(items, |mut row, item| {
        row.push_bind(item.region_id)
            .push_bind(item.outlet_id)
            .push_bind(&item.smartphones)
            .push_bind(&item.memory_cards)
            .push_bind(&item.notebooks)
            .push_bind(&item.total);
    });
    builder
}

#[async_trait]
impl ItemWriter<SalesReportItem> for PgReportWriter {
    async fn write(&mut self, items: &[SalesReportItem]) -> Result<(), ItemError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ItemError::write(format!("Failed to begin transaction: {}", e)))?;

        for mut query in insert_queries(items) {
            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| ItemError::write(format!("Failed to insert sales report rows: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| ItemError::write(format!("Failed to commit chunk: {}", e)))?;

        debug!("Inserted {} row(s) into sales_report", items.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn item(outlet: i64) -> SalesReportItem {
        SalesReportItem {
            region_id: 1,
            outlet_id: outlet,
            smartphones: BigDecimal::from(1),
            memory_cards: BigDecimal::from(2),
            notebooks: BigDecimal::from(3),
            total: BigDecimal::from(6),
        }
    }

    #[test]
    fn test_insert_query_binds_one_row_per_item() {
        let items = vec![item(10), item(11)];
        let query = insert_query(&items);

        assert_eq!(
            query.sql(),
            "INSERT INTO sales_report (region_id, outlet_id, smartphones, memory_cards, notebooks, total) \
             VALUES ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12)"
        );
    }

    #[test]
    fn test_large_chunk_stays_under_bind_limit() {
        let items: Vec<_> = (0..=MAX_ROWS_PER_INSERT as i64).map(item).collect();

        let queries: Vec<_> = insert_queries(&items).collect();

        assert_eq!(MAX_ROWS_PER_INSERT, 10922);
        assert_eq!(queries.len(), 2);
        assert!(queries[0].sql().ends_with("$65527, $65528, $65529, $65530, $65531, $65532)"));
        assert!(!queries[0].sql().contains("$65533"));
        assert!(queries[1].sql().ends_with("VALUES ($1, $2, $3, $4, $5, $6)"));
    }
}
