// Banking Workshop - Dashboard data
//
// Everything the terminal dashboard shows, loaded in one pass so the render
// loop never touches Redis.

use std::collections::HashMap;

use chrono::Utc;
use redis::aio::ConnectionManager;

use crate::error::Result;
use crate::modules::spending_over_time::TimeRange;
use crate::modules::{ordered_transactions, spending_categories, spending_over_time, store_transaction};
use crate::status::{self, UnlockStatus};
use crate::stream;
use crate::transaction::Transaction;

pub const RECENT_LIMIT: usize = 50;
pub const TOP_LIMIT: usize = 10;
pub const SPENDING_WINDOW_MS: i64 = 60 * 60 * 1000;
pub const SPENDING_BUCKET_MS: u64 = 60 * 1000;

#[derive(Debug, Default, Clone)]
pub struct DashboardData {
    pub status: UnlockStatus,
    pub stream_length: usize,
    pub transactions: Vec<Transaction>,
    pub categories: Vec<(String, f64)>,
    pub merchants: HashMap<String, Vec<(String, f64)>>,
    pub spending: Vec<(i64, f64)>,
}

impl DashboardData {
    pub fn merchants_for(&self, category: &str) -> &[(String, f64)] {
        self.merchants.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_spent(&self) -> f64 {
        self.categories.iter().map(|(_, total)| total).sum()
    }
}

/// Read every locked-or-not section; locked sections stay empty
pub async fn load(conn: &mut ConnectionManager, stream_key: &str) -> Result<DashboardData> {
    let status = status::unlock_status(conn).await;

    let mut data = DashboardData {
        status,
        stream_length: stream::length(conn, stream_key).await?,
        ..Default::default()
    };

    if status.transactions_unlocked {
        let ids = ordered_transactions::get_recent_transactions(conn, RECENT_LIMIT).await?;
        data.transactions = store_transaction::get_transactions_by_ids(conn, &ids).await?;
    }

    if status.categories_unlocked {
        data.categories = spending_categories::get_top_categories(conn, TOP_LIMIT).await?;

        for (category, _) in &data.categories {
            let merchants =
                spending_categories::get_top_merchants_in_category(conn, category, TOP_LIMIT).await?;
            data.merchants.insert(category.clone(), merchants);
        }
    }

    if status.timeseries_unlocked {
        let now = Utc::now().timestamp_millis();
        let range = TimeRange {
            from: Some(now - SPENDING_WINDOW_MS),
            to: Some(now),
            bucket_ms: SPENDING_BUCKET_MS,
        };
        data.spending = spending_over_time::get_spending(conn, range).await?;
    }

    Ok(data)
}

/// Bucket totals as whole cents, the unit the sparkline widget takes
pub fn sparkline_points(samples: &[(i64, f64)]) -> Vec<u64> {
    samples
        .iter()
        .map(|(_, amount)| (amount.max(0.0) * 100.0).round() as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparkline_points_in_cents() {
        let points = sparkline_points(&[(1, 12.34), (2, 0.0), (3, -5.0), (4, 0.006)]);
        assert_eq!(points, vec![1234, 0, 0, 1]);
    }

    #[test]
    fn test_merchants_for_unknown_category() {
        let mut data = DashboardData::default();
        data.merchants
            .insert("coffee".to_string(), vec![("Starbucks".to_string(), 12.0)]);

        assert_eq!(data.merchants_for("coffee").len(), 1);
        assert!(data.merchants_for("travel").is_empty());
    }

    #[test]
    fn test_total_spent() {
        let data = DashboardData {
            categories: vec![("travel".to_string(), 300.5), ("coffee".to_string(), 19.5)],
            ..Default::default()
        };

        assert_eq!(data.total_spent(), 320.0);
    }
}
