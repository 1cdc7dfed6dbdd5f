// Store Transaction - complete transaction as a JSON document
//
// `transaction:{id}` is the source of truth for every other module and for the API.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Value};
use tracing::debug;

use crate::error::Result;
use crate::keys;
use crate::transaction::Transaction;

/// Store the document at the root path.
///
/// `NX` makes redelivered stream entries harmless: returns `false` when the
/// document already existed and nothing was written.
pub async fn process_transaction(conn: &mut ConnectionManager, tx: &Transaction) -> Result<bool> {
    let doc = serde_json::to_string(tx)?;

    let reply: Value = redis::cmd("JSON.SET")
        .arg(keys::transaction(&tx.transaction_id))
        .arg("$")
        .arg(doc)
        .arg("NX")
        .query_async(conn)
        .await?;

    let stored = !matches!(reply, Value::Nil);
    if !stored {
        debug!(id = %tx.transaction_id, "Transaction already stored");
    }

    Ok(stored)
}

/// Drop the document so a later redelivery stores it again
pub async fn remove_transaction(conn: &mut ConnectionManager, tx_id: &str) -> Result<()> {
    let _: () = conn.del(keys::transaction(tx_id)).await?;
    Ok(())
}

/// Single document by id
pub async fn get_transaction(conn: &mut ConnectionManager, tx_id: &str) -> Result<Option<Transaction>> {
    let reply: Option<String> = redis::cmd("JSON.GET")
        .arg(keys::transaction(tx_id))
        .arg("$")
        .query_async(conn)
        .await?;

    match reply {
        Some(raw) => parse_root_document(&raw),
        None => Ok(None),
    }
}

/// All documents for `tx_ids` in one `JSON.MGET`, preserving order.
/// Ids without a document are skipped.
pub async fn get_transactions_by_ids(
    conn: &mut ConnectionManager,
    tx_ids: &[String],
) -> Result<Vec<Transaction>> {
    if tx_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut cmd = redis::cmd("JSON.MGET");
    for id in tx_ids {
        cmd.arg(keys::transaction(id));
    }
    cmd.arg("$");

    let replies: Vec<Option<String>> = cmd.query_async(conn).await?;

    parse_documents(replies)
}

/// `JSON.GET key $` answers with a one-element array
fn parse_root_document(raw: &str) -> Result<Option<Transaction>> {
    let mut docs: Vec<Transaction> = serde_json::from_str(raw)?;
    Ok(if docs.is_empty() { None } else { Some(docs.swap_remove(0)) })
}

fn parse_documents(replies: Vec<Option<String>>) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::with_capacity(replies.len());

    for raw in replies.into_iter().flatten() {
        if let Some(tx) = parse_root_document(&raw)? {
            transactions.push(tx);
        }
    }

    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_document() {
        let raw = r#"[{"transactionId":"TXN-1","amount":12.5,"merchant":"Target","timestamp":1700000000000}]"#;
        let tx = parse_root_document(raw).unwrap().unwrap();

        assert_eq!(tx.transaction_id, "TXN-1");
        assert_eq!(tx.merchant.as_deref(), Some("Target"));
        assert!(tx.category.is_none());
    }

    #[test]
    fn test_parse_root_document_empty_array() {
        assert!(parse_root_document("[]").unwrap().is_none());
    }

    #[test]
    fn test_parse_documents_skips_missing() {
        let replies = vec![
            Some(r#"[{"transactionId":"TXN-3","amount":1.0}]"#.to_string()),
            None,
            Some(r#"[{"transactionId":"TXN-1","amount":2.0}]"#.to_string()),
            Some("[]".to_string()),
        ];

        let ids: Vec<String> = parse_documents(replies)
            .unwrap()
            .into_iter()
            .map(|tx| tx.transaction_id)
            .collect();

        assert_eq!(ids, vec!["TXN-3", "TXN-1"]);
    }

    #[test]
    fn test_parse_documents_rejects_garbage() {
        let replies = vec![Some("not json".to_string())];
        assert!(parse_documents(replies).is_err());
    }
}
