// Banking Workshop - Unlock status
//
// A UI tab unlocks once the Redis structures behind it hold data.

use std::collections::BTreeMap;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::keys;
use crate::modules::{ordered_transactions, search};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlockStatus {
    pub transactions_unlocked: bool,
    pub categories_unlocked: bool,
    pub timeseries_unlocked: bool,
    pub search_unlocked: bool,
}

/// Snapshot of the raw keys, for figuring out why a tab stays locked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub redis_list_length: usize,
    pub first_5_ids: Vec<String>,
    pub json_exists_for_first_5: BTreeMap<String, bool>,
    pub total_json_docs: usize,
}

/// Check every tab; a failing check only locks its own tab
pub async fn unlock_status(conn: &mut ConnectionManager) -> UnlockStatus {
    UnlockStatus {
        transactions_unlocked: locked_on_error(
            "transactions",
            both_present(conn, keys::ORDERED_TRANSACTIONS, keys::TRANSACTION_PREFIX).await,
        ),
        categories_unlocked: locked_on_error(
            "categories",
            both_present(conn, keys::SPENDING_CATEGORIES, keys::SPENDING_CATEGORY_PREFIX).await,
        ),
        timeseries_unlocked: locked_on_error(
            "timeseries",
            conn.exists::<_, bool>(keys::SPENDING_TIMESERIES).await.map_err(Into::into),
        ),
        search_unlocked: search::index_exists(conn).await,
    }
}

pub async fn debug_info(conn: &mut ConnectionManager) -> Result<DebugInfo> {
    let redis_list_length = ordered_transactions::count(conn).await?;
    let first_5_ids = ordered_transactions::get_recent_transactions(conn, 5).await?;

    let mut json_exists_for_first_5 = BTreeMap::new();
    for id in &first_5_ids {
        let exists: bool = conn.exists(keys::transaction(id)).await?;
        json_exists_for_first_5.insert(id.clone(), exists);
    }

    let total_json_docs = count_matching(conn, &format!("{}*", keys::TRANSACTION_PREFIX)).await?;

    Ok(DebugInfo {
        redis_list_length,
        first_5_ids,
        json_exists_for_first_5,
        total_json_docs,
    })
}

fn locked_on_error(tab: &str, check: Result<bool>) -> bool {
    check.unwrap_or_else(|e| {
        debug!("Unlock check for {tab} failed: {e}");
        false
    })
}

/// `key` exists and at least one key starts with `prefix`
async fn both_present(conn: &mut ConnectionManager, key: &str, prefix: &str) -> Result<bool> {
    let exists: bool = conn.exists(key).await?;
    if !exists {
        return Ok(false);
    }

    any_matching(conn, &format!("{prefix}*")).await
}

async fn any_matching(conn: &mut ConnectionManager, pattern: &str) -> Result<bool> {
    let mut keys = conn.scan_match::<_, String>(pattern).await?;
    Ok(keys.next_item().await.is_some())
}

async fn count_matching(conn: &mut ConnectionManager, pattern: &str) -> Result<usize> {
    let mut keys = conn.scan_match::<_, String>(pattern).await?;
    let mut count = 0;
    while keys.next_item().await.is_some() {
        count += 1;
    }
    Ok(count)
}
