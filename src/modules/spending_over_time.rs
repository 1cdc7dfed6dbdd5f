// Spending Over Time - RedisTimeSeries samples of amount spent
//
// spending:timeseries              every transaction
// spending:timeseries:{category}   one series per category, labelled for TS.MRANGE

use redis::aio::ConnectionManager;
use redis::{Pipeline, Value};

use crate::error::{Result, WorkshopError};
use crate::keys;
use crate::transaction::Transaction;

pub const DEFAULT_BUCKET_MS: u64 = 60_000;

/// Query window for a range read; `None` bounds mean "earliest"/"latest"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub bucket_ms: u64,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            bucket_ms: DEFAULT_BUCKET_MS,
        }
    }
}

impl TimeRange {
    fn from_arg(&self) -> String {
        self.from.map_or_else(|| "-".to_string(), |ts| ts.to_string())
    }

    fn to_arg(&self) -> String {
        self.to.map_or_else(|| "+".to_string(), |ts| ts.to_string())
    }
}

/// Add the amount to the overall series and to the category series.
/// Samples landing on the same millisecond are summed.
pub async fn process_transaction(conn: &mut ConnectionManager, tx: &Transaction) -> Result<()> {
    let mut pipe = redis::pipe();
    queue(&mut pipe, tx);
    let _: () = pipe.query_async(conn).await?;

    Ok(())
}

pub fn queue(pipe: &mut Pipeline, tx: &Transaction) {
    let timestamp = if tx.timestamp > 0 {
        tx.timestamp.to_string()
    } else {
        "*".to_string()
    };

    pipe.cmd("TS.ADD")
        .arg(keys::SPENDING_TIMESERIES)
        .arg(&timestamp)
        .arg(tx.amount)
        .arg("ON_DUPLICATE")
        .arg("SUM")
        .arg("LABELS")
        .arg("type")
        .arg("spending")
        .ignore();

    if let Some(category) = tx.category.as_deref() {
        pipe.cmd("TS.ADD")
            .arg(keys::category_timeseries(category))
            .arg(&timestamp)
            .arg(tx.amount)
            .arg("ON_DUPLICATE")
            .arg("SUM")
            .arg("LABELS")
            .arg("type")
            .arg("spending")
            .arg("category")
            .arg(category)
            .ignore();
    }
}

/// Total spending per bucket
pub async fn get_spending(conn: &mut ConnectionManager, range: TimeRange) -> Result<Vec<(i64, f64)>> {
    query_range(conn, keys::SPENDING_TIMESERIES, range).await
}

/// Spending per bucket for one category
pub async fn get_category_spending(
    conn: &mut ConnectionManager,
    category: &str,
    range: TimeRange,
) -> Result<Vec<(i64, f64)>> {
    query_range(conn, &keys::category_timeseries(category), range).await
}

async fn query_range(conn: &mut ConnectionManager, key: &str, range: TimeRange) -> Result<Vec<(i64, f64)>> {
    let reply: Value = redis::cmd("TS.RANGE")
        .arg(key)
        .arg(range.from_arg())
        .arg(range.to_arg())
        .arg("AGGREGATION")
        .arg("sum")
        .arg(range.bucket_ms.max(1))
        .query_async(conn)
        .await?;

    parse_samples(reply)
}

/// `TS.RANGE` reply: `[[timestamp, value], ...]`, value sent as a string (RESP2) or double (RESP3)
fn parse_samples(reply: Value) -> Result<Vec<(i64, f64)>> {
    let Value::Array(rows) = reply else {
        return Err(WorkshopError::UnexpectedReply(format!("TS.RANGE: {reply:?}")));
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Array(pair) if pair.len() == 2 => {
                let timestamp = match &pair[0] {
                    Value::Int(ts) => *ts,
                    other => return Err(unexpected_sample(other)),
                };
                let value = sample_value(&pair[1]).ok_or_else(|| unexpected_sample(&pair[1]))?;
                Ok((timestamp, value))
            }
            other => Err(unexpected_sample(&other)),
        })
        .collect()
}

fn sample_value(value: &Value) -> Option<f64> {
    match value {
        Value::Double(v) => Some(*v),
        Value::Int(v) => Some(*v as f64),
        Value::SimpleString(s) => s.parse().ok(),
        Value::BulkString(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
        _ => None,
    }
}

fn unexpected_sample(value: &Value) -> WorkshopError {
    WorkshopError::UnexpectedReply(format!("TS.RANGE sample: {value:?}"))
}
