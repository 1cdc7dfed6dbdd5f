// Ordered Transactions - newest-first list of transaction ids

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};

use crate::error::Result;
use crate::keys;
use crate::transaction::Transaction;

/// Push the id to the head of the list and keep at most `cap` entries
pub async fn process_transaction(
    conn: &mut ConnectionManager,
    tx: &Transaction,
    cap: usize,
) -> Result<()> {
    let mut pipe = redis::pipe();
    queue(&mut pipe, tx, cap);
    let _: () = pipe.query_async(conn).await?;

    Ok(())
}

pub fn queue(pipe: &mut Pipeline, tx: &Transaction, cap: usize) {
    pipe.lpush(keys::ORDERED_TRANSACTIONS, &tx.transaction_id)
        .ignore()
        .ltrim(keys::ORDERED_TRANSACTIONS, 0, last_index(cap))
        .ignore();
}

/// Ids of the `limit` most recent transactions
pub async fn get_recent_transactions(conn: &mut ConnectionManager, limit: usize) -> Result<Vec<String>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = conn
        .lrange(keys::ORDERED_TRANSACTIONS, 0, last_index(limit))
        .await?;

    Ok(ids)
}

pub async fn count(conn: &mut ConnectionManager) -> Result<usize> {
    Ok(conn.llen(keys::ORDERED_TRANSACTIONS).await?)
}

/// Inclusive end index for LRANGE/LTRIM covering `n` elements
fn last_index(n: usize) -> isize {
    (n.max(1) - 1).min(isize::MAX as usize) as isize
}
