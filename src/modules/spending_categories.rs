// Spending Categories - sorted sets of money spent
//
// spending:categories              category -> total amount
// spending:category:{category}     merchant -> total amount

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};
use tracing::debug;

use crate::error::Result;
use crate::keys;
use crate::transaction::Transaction;

pub async fn process_transaction(conn: &mut ConnectionManager, tx: &Transaction) -> Result<()> {
    let mut pipe = redis::pipe();
    queue(&mut pipe, tx);
    let _: () = pipe.query_async(conn).await?;

    Ok(())
}

/// Add both increments to `pipe`; transactions without a category add nothing
pub fn queue(pipe: &mut Pipeline, tx: &Transaction) {
    let Some(category) = tx.category.as_deref() else {
        debug!(id = %tx.transaction_id, "No category, skipping spending aggregation");
        return;
    };

    pipe.zincr(keys::SPENDING_CATEGORIES, category, tx.amount)
        .ignore()
        .zincr(keys::category_merchants(category), tx.merchant_or_unknown(), tx.amount)
        .ignore();
}

/// Highest-spending categories with their totals
pub async fn get_top_categories(conn: &mut ConnectionManager, limit: usize) -> Result<Vec<(String, f64)>> {
    top_members(conn, keys::SPENDING_CATEGORIES, limit).await
}

/// Highest-spending merchants within one category
pub async fn get_top_merchants_in_category(
    conn: &mut ConnectionManager,
    category: &str,
    limit: usize,
) -> Result<Vec<(String, f64)>> {
    top_members(conn, &keys::category_merchants(category), limit).await
}

async fn top_members(conn: &mut ConnectionManager, key: &str, limit: usize) -> Result<Vec<(String, f64)>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
    let members: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, stop).await?;

    Ok(members)
}
