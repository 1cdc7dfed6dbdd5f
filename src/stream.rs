// Banking Workshop - Transaction stream
//
// Producers (generator, CSV import) XADD raw transactions; the processor reads
// them through a consumer group and runs every module on each entry.
//
// Delivery is at-least-once: an entry is acknowledged only after all modules
// succeeded, and the NX write in store_transaction absorbs redeliveries. A
// failed aggregation removes the document again, so the retry is not taken
// for a duplicate.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::modules::{self, search, ProcessOutcome};
use crate::transaction::Transaction;

const BATCH_SIZE: usize = 100;
const BLOCK_MS: usize = 2_000;
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

// ============================================================================
// PRODUCER SIDE
// ============================================================================

/// Append one transaction, trimming the stream to roughly `maxlen` entries
pub async fn publish(
    conn: &mut ConnectionManager,
    stream_key: &str,
    maxlen: usize,
    tx: &Transaction,
) -> Result<String> {
    let fields = tx.to_fields();
    let id: String = conn
        .xadd_maxlen(stream_key, StreamMaxlen::Approx(maxlen), "*", &fields)
        .await?;

    Ok(id)
}

/// Most recent transaction on the stream, if any
pub async fn latest(conn: &mut ConnectionManager, stream_key: &str) -> Result<Option<Transaction>> {
    let reply: StreamRangeReply = conn.xrevrange_count(stream_key, "+", "-", 1).await?;

    Ok(reply
        .ids
        .first()
        .and_then(|entry| Transaction::from_fields(&entry_fields(entry)).ok()))
}

pub async fn length(conn: &mut ConnectionManager, stream_key: &str) -> Result<usize> {
    Ok(conn.xlen(stream_key).await?)
}

/// String view of an entry's field/value pairs; non-string values are dropped
fn entry_fields(entry: &StreamId) -> HashMap<String, String> {
    entry
        .map
        .iter()
        .filter_map(|(field, value)| {
            redis::from_redis_value::<String>(value)
                .ok()
                .map(|v| (field.clone(), v))
        })
        .collect()
}

// ============================================================================
// CONSUMER SIDE
// ============================================================================

/// Counters reported when the processor stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStats {
    pub processed: u64,
    pub duplicates: u64,
    pub invalid: u64,
    pub failed: u64,
}

pub struct Processor {
    conn: ConnectionManager,
    stream_key: String,
    group: String,
    consumer: String,
    ordered_list_cap: usize,
    stats: ProcessorStats,
}

impl Processor {
    pub fn new(conn: ConnectionManager, config: &Config) -> Self {
        Self {
            conn,
            stream_key: config.stream_key.clone(),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
            ordered_list_cap: config.ordered_list_cap,
            stats: ProcessorStats::default(),
        }
    }

    /// Consume until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> Result<ProcessorStats>
    where
        F: Future<Output = ()>,
    {
        self.ensure_group().await?;

        if let Err(e) = search::ensure_index(&mut self.conn).await {
            warn!("Search index not available (is RediSearch loaded?): {e}");
        }

        info!(
            stream = %self.stream_key,
            group = %self.group,
            consumer = %self.consumer,
            "Processor started"
        );

        let replayed = self.drain_pending().await?;
        if replayed > 0 {
            info!("Re-processed {replayed} pending entries");
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                batch = self.read(">", Some(BLOCK_MS)) => match batch {
                    Ok(entries) => self.handle_batch(entries).await,
                    Err(e) => {
                        error!("Failed to read from {}: {e}", self.stream_key);
                        tokio::time::sleep(READ_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        info!(
            processed = self.stats.processed,
            duplicates = self.stats.duplicates,
            invalid = self.stats.invalid,
            failed = self.stats.failed,
            "Processor stopped"
        );

        Ok(self.stats)
    }

    async fn ensure_group(&mut self) -> Result<()> {
        let created: redis::RedisResult<()> = self
            .conn
            .xgroup_create_mkstream(&self.stream_key, &self.group, "0")
            .await;

        match created {
            Ok(()) => {
                info!("Created consumer group {} on {}", self.group, self.stream_key);
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replay entries delivered to this consumer before a crash.
    ///
    /// Pages through the pending list by id, so entries that fail again stay
    /// pending without stopping the ones after them.
    async fn drain_pending(&mut self) -> Result<usize> {
        let mut cursor = "0".to_string();
        let mut replayed = 0;

        loop {
            let batch = self.read(&cursor, None).await?;
            let Some(last) = batch.last() else {
                break;
            };

            cursor = last.id.clone();
            replayed += batch.len();
            debug!(count = batch.len(), up_to = %cursor, "Replaying pending entries");
            self.handle_batch(batch).await;
        }

        Ok(replayed)
    }

    async fn read(&mut self, from_id: &str, block_ms: Option<usize>) -> Result<Vec<StreamId>> {
        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(BATCH_SIZE);
        if let Some(ms) = block_ms {
            options = options.block(ms);
        }

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream_key], &[from_id], &options)
            .await?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    async fn handle_batch(&mut self, entries: Vec<StreamId>) {
        for entry in entries {
            self.handle_entry(entry).await;
        }
    }

    async fn handle_entry(&mut self, entry: StreamId) {
        let tx = match Transaction::from_fields(&entry_fields(&entry)) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(entry = %entry.id, "Dropping invalid stream entry: {e}");
                self.stats.invalid += 1;
                self.ack(&entry.id).await;
                return;
            }
        };

        match modules::process_transaction(&mut self.conn, &tx, self.ordered_list_cap).await {
            Ok(ProcessOutcome::Processed) => {
                self.stats.processed += 1;
                self.ack(&entry.id).await;
            }
            Ok(ProcessOutcome::Duplicate) => {
                debug!(entry = %entry.id, id = %tx.transaction_id, "Duplicate delivery");
                self.stats.duplicates += 1;
                self.ack(&entry.id).await;
            }
            Err(e) => {
                // Left pending; picked up again on the next start
                error!(entry = %entry.id, id = %tx.transaction_id, "Processing failed: {e}");
                self.stats.failed += 1;
            }
        }
    }

    async fn ack(&mut self, entry_id: &str) {
        let acked: redis::RedisResult<i64> = self
            .conn
            .xack(&self.stream_key, &self.group, &[entry_id])
            .await;

        if let Err(e) = acked {
            error!(entry = %entry_id, "XACK failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;

    #[test]
    fn test_entry_fields_to_transaction() {
        let mut map = HashMap::new();
        map.insert("transactionId".to_string(), Value::BulkString(b"TXN-42".to_vec()));
        map.insert("amount".to_string(), Value::BulkString(b"19.99".to_vec()));
        map.insert("category".to_string(), Value::BulkString(b"dining".to_vec()));
        map.insert("weird".to_string(), Value::Array(vec![]));

        let entry = StreamId {
            id: "1700000000000-0".to_string(),
            map,
        };

        let fields = entry_fields(&entry);
        assert!(!fields.contains_key("weird"));

        let tx = Transaction::from_fields(&fields).unwrap();
        assert_eq!(tx.transaction_id, "TXN-42");
        assert_eq!(tx.category.as_deref(), Some("dining"));
    }

    #[test]
    fn test_deleted_entry_is_invalid() {
        let entry = StreamId {
            id: "1700000000000-1".to_string(),
            map: HashMap::new(),
        };

        assert!(Transaction::from_fields(&entry_fields(&entry)).is_err());
    }

    // Live processor runs; need Redis Stack:
    // REDIS_URL=redis://localhost:6379 cargo test -- --ignored

    const TEST_CATEGORY: &str = "workshop-stream-test";

    async fn live_connection() -> ConnectionManager {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = redis::Client::open(url).unwrap();
        client.get_connection_manager().await.unwrap()
    }

    fn test_config() -> Config {
        Config {
            stream_key: format!("test:stream:{}", uuid::Uuid::new_v4().simple()),
            consumer_group: "test-processor".to_string(),
            consumer_name: "test-consumer".to_string(),
            ..Config::default()
        }
    }

    fn test_transaction(category: &str) -> Transaction {
        serde_json::from_value(serde_json::json!({
            "transactionId": format!("TXN-TEST-{}", uuid::Uuid::new_v4().simple()),
            "amount": 4.25,
            "merchant": "Test Merchant",
            "category": category,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }))
        .unwrap()
    }

    /// Run a processor until the blocking read has had time to see new entries
    async fn run_briefly(conn: &ConnectionManager, config: &Config) -> ProcessorStats {
        let shutdown = tokio::time::sleep(Duration::from_millis(2_500));
        Processor::new(conn.clone(), config).run(shutdown).await.unwrap()
    }

    async fn pending_count(conn: &mut ConnectionManager, config: &Config) -> usize {
        let reply: redis::streams::StreamPendingReply = conn
            .xpending(&config.stream_key, &config.consumer_group)
            .await
            .unwrap();
        reply.count()
    }

    async fn cleanup(conn: &mut ConnectionManager, config: &Config, txs: &[Transaction]) {
        let mut pipe = redis::pipe();
        pipe.del(&config.stream_key).ignore();
        for tx in txs {
            pipe.del(crate::keys::transaction(&tx.transaction_id))
                .ignore()
                .lrem(crate::keys::ORDERED_TRANSACTIONS, 0, &tx.transaction_id)
                .ignore();
        }
        let _: () = pipe.query_async(conn).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_invalid_entries_are_acked() {
        let mut conn = live_connection().await;
        let config = test_config();

        let _: String = conn
            .xadd(&config.stream_key, "*", &[("amount", "1.00")])
            .await
            .unwrap();
        let _: String = conn
            .xadd(&config.stream_key, "*", &[("transactionId", "TXN-BAD"), ("amount", "abc")])
            .await
            .unwrap();

        let stats = run_briefly(&conn, &config).await;

        assert_eq!(stats.invalid, 2);
        assert_eq!(stats.processed, 0);
        assert_eq!(pending_count(&mut conn, &config).await, 0);

        cleanup(&mut conn, &config, &[]).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_delivery_is_acked() {
        let mut conn = live_connection().await;
        let config = test_config();
        let tx = test_transaction(TEST_CATEGORY);

        publish(&mut conn, &config.stream_key, config.stream_maxlen, &tx).await.unwrap();
        publish(&mut conn, &config.stream_key, config.stream_maxlen, &tx).await.unwrap();

        let stats = run_briefly(&conn, &config).await;

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(pending_count(&mut conn, &config).await, 0);

        cleanup(&mut conn, &config, &[tx]).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_pending_entries_drained_past_one_batch() {
        let mut conn = live_connection().await;
        let config = test_config();

        let _: () = conn
            .xgroup_create_mkstream(&config.stream_key, &config.consumer_group, "0")
            .await
            .unwrap();

        let txs: Vec<Transaction> = (0..BATCH_SIZE + 50).map(|_| test_transaction(TEST_CATEGORY)).collect();
        for tx in &txs {
            publish(&mut conn, &config.stream_key, config.stream_maxlen, tx).await.unwrap();
        }

        // Deliver everything to the consumer without acking, as a crashed run would
        let options = StreamReadOptions::default()
            .group(&config.consumer_group, &config.consumer_name)
            .count(txs.len());
        let _: StreamReadReply = conn
            .xread_options(&[&config.stream_key], &[">"], &options)
            .await
            .unwrap();
        assert_eq!(pending_count(&mut conn, &config).await, txs.len());

        let stats = run_briefly(&conn, &config).await;

        assert_eq!(stats.processed, txs.len() as u64);
        assert_eq!(pending_count(&mut conn, &config).await, 0);

        cleanup(&mut conn, &config, &txs).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_failed_entry_stays_pending_until_retried() {
        let mut conn = live_connection().await;
        let config = test_config();
        let category = format!("workshop-broken-{}", uuid::Uuid::new_v4().simple());
        let tx = test_transaction(&category);

        // Merchant totals key holding a string makes the aggregation fail
        let merchants_key = crate::keys::category_merchants(&category);
        let _: () = conn.set(&merchants_key, "not a zset").await.unwrap();
        publish(&mut conn, &config.stream_key, config.stream_maxlen, &tx).await.unwrap();

        let stats = run_briefly(&conn, &config).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 0);
        assert_eq!(pending_count(&mut conn, &config).await, 1);

        let _: () = conn.del(&merchants_key).await.unwrap();

        let stats = run_briefly(&conn, &config).await;
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(pending_count(&mut conn, &config).await, 0);

        let _: () = redis::pipe()
            .zrem(crate::keys::SPENDING_CATEGORIES, &category)
            .del(merchants_key)
            .del(crate::keys::category_timeseries(&category))
            .query_async(&mut conn)
            .await
            .unwrap();
        cleanup(&mut conn, &config, &[tx]).await;
    }
}
