// Processor modules
//
// Each module owns one Redis data structure and exposes the write done per
// transaction plus the reads the API needs. None of them hold state.

pub mod ordered_transactions;
pub mod search;
pub mod spending_categories;
pub mod spending_over_time;
pub mod store_transaction;

use redis::aio::ConnectionManager;
use redis::Pipeline;
use tracing::{debug, error};

use crate::error::Result;
use crate::transaction::Transaction;

/// What happened to one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Stored and aggregated
    Processed,
    /// Document already existed; aggregations skipped
    Duplicate,
}

/// Run every module for one transaction.
///
/// The document is written first with `NX`; a duplicate stops there so the
/// sorted sets and time series never count the same transaction twice. The
/// aggregations then run as one `MULTI`/`EXEC`. When that fails the document
/// is removed again, so a redelivery is processed in full instead of being
/// taken for a duplicate.
pub async fn process_transaction(
    conn: &mut ConnectionManager,
    tx: &Transaction,
    ordered_list_cap: usize,
) -> Result<ProcessOutcome> {
    if !store_transaction::process_transaction(conn, tx).await? {
        return Ok(ProcessOutcome::Duplicate);
    }

    let aggregated: redis::RedisResult<()> = aggregation_pipeline(tx, ordered_list_cap)
        .query_async(conn)
        .await;

    if let Err(e) = aggregated {
        if let Err(undo) = store_transaction::remove_transaction(conn, &tx.transaction_id).await {
            error!(id = %tx.transaction_id, "Could not remove document after failed aggregation: {undo}");
        }
        return Err(e.into());
    }

    debug!(
        id = %tx.transaction_id,
        amount = tx.amount,
        category = tx.category.as_deref().unwrap_or("-"),
        "Processed transaction"
    );

    Ok(ProcessOutcome::Processed)
}

/// List, sorted set and time series writes for one transaction, applied atomically
fn aggregation_pipeline(tx: &Transaction, ordered_list_cap: usize) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();

    ordered_transactions::queue(&mut pipe, tx, ordered_list_cap);
    spending_categories::queue(&mut pipe, tx);
    spending_over_time::queue(&mut pipe, tx);

    pipe
}
