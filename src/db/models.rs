use crate::types::MarketRecord;

/// Row type for the `market_records` table (see migrations/).
#[derive(Debug, sqlx::FromRow)]
pub struct MarketRecordRow {
    pub id: i64,
    pub event_name: String,
    pub event_id: String,
    pub market_id: String,
    pub title: Option<String>,
    /// Nanosecond UTC epoch of the batch insert that wrote this row.
    pub created_at: i64,
}

impl From<MarketRecordRow> for MarketRecord {
    fn from(r: MarketRecordRow) -> Self {
        MarketRecord {
            event_name: r.event_name,
            event_id: r.event_id,
            market_id: r.market_id,
            title: r.title,
        }
    }
}
