// Transaction Search - RediSearch index over the JSON documents
//
// The index is maintained by Redis itself: every `transaction:*` document written by
// store_transaction is picked up automatically once the index exists.

use std::time::Instant;

use redis::aio::ConnectionManager;
use redis::Value;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, WorkshopError};
use crate::keys;
use crate::transaction::Transaction;

const INDEX_SCHEMA: &[&str] = &[
    "$.merchant", "AS", "merchant", "TEXT", "WEIGHT", "2.0",
    "$.category", "AS", "category", "TAG",
    "$.location", "AS", "location", "TEXT",
    "$.amount", "AS", "amount", "NUMERIC", "SORTABLE",
    "$.timestamp", "AS", "timestamp", "NUMERIC", "SORTABLE",
];

/// One search hit
///
/// `score` is a distance in [0, 1]: 0 for the best hit of the result set,
/// growing as relevance drops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub total: i64,
    pub search_ms: f64,
}

/// Create the index if it is missing. Returns `true` when it was created now.
pub async fn ensure_index(conn: &mut ConnectionManager) -> Result<bool> {
    let mut cmd = redis::cmd("FT.CREATE");
    cmd.arg(keys::TRANSACTION_INDEX)
        .arg("ON")
        .arg("JSON")
        .arg("PREFIX")
        .arg(1)
        .arg(keys::TRANSACTION_PREFIX)
        .arg("SCHEMA");
    for part in INDEX_SCHEMA {
        cmd.arg(*part);
    }

    let result: redis::RedisResult<()> = cmd.query_async(conn).await;

    match result {
        Ok(()) => {
            info!("Created search index {}", keys::TRANSACTION_INDEX);
            Ok(true)
        }
        Err(e) if e.to_string().contains("Index already exists") => {
            debug!("Search index {} already exists", keys::TRANSACTION_INDEX);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn index_exists(conn: &mut ConnectionManager) -> bool {
    let info: redis::RedisResult<Value> = redis::cmd("FT.INFO")
        .arg(keys::TRANSACTION_INDEX)
        .query_async(conn)
        .await;

    info.is_ok()
}

/// Full-text search over merchant, category and location
pub async fn search_transactions(
    conn: &mut ConnectionManager,
    query: &str,
    limit: usize,
) -> Result<SearchOutcome> {
    let Some(expression) = build_query(query) else {
        return Ok(SearchOutcome {
            hits: Vec::new(),
            total: 0,
            search_ms: 0.0,
        });
    };

    let started = Instant::now();
    let reply: Value = redis::cmd("FT.SEARCH")
        .arg(keys::TRANSACTION_INDEX)
        .arg(&expression)
        .arg("WITHSCORES")
        .arg("LIMIT")
        .arg(0)
        .arg(limit)
        .query_async(conn)
        .await?;
    let search_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    let (total, raw_hits) = parse_search_reply(reply)?;
    debug!(query = %expression, total, "FT.SEARCH finished in {search_ms}ms");

    Ok(SearchOutcome {
        hits: to_distances(raw_hits),
        total,
        search_ms,
    })
}

/// Turn free text into an OR query of escaped terms, also matching them as
/// category tags; `None` when nothing is left
fn build_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(escape_term)
        .filter(|t| !t.is_empty())
        .collect();

    if terms.is_empty() {
        return None;
    }

    let joined = terms.join("|");
    Some(format!("({joined}|@category:{{{joined}}})"))
}

/// Backslash-escape RediSearch query syntax characters
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for c in term.chars() {
        if c.is_alphanumeric() || c == '_' {
            escaped.push(c);
        } else if !c.is_whitespace() {
            escaped.push('\\');
            escaped.push(c);
        }
    }

    escaped
}

/// RESP2 layout: `[total, key, score, ["$", json], key, score, [...], ...]`
fn parse_search_reply(reply: Value) -> Result<(i64, Vec<(Transaction, f64)>)> {
    let Value::Array(items) = reply else {
        return Err(WorkshopError::UnexpectedReply(format!("FT.SEARCH: {reply:?}")));
    };

    let mut items = items.into_iter();
    let total = match items.next() {
        Some(Value::Int(total)) => total,
        other => {
            return Err(WorkshopError::UnexpectedReply(format!(
                "FT.SEARCH total: {other:?}"
            )))
        }
    };

    let mut hits = Vec::new();

    while let Some(_key) = items.next() {
        let (Some(score), Some(fields)) = (items.next(), items.next()) else {
            return Err(WorkshopError::UnexpectedReply("FT.SEARCH: truncated hit".into()));
        };

        let score = text(&score)
            .and_then(|s| s.parse::<f64>().ok())
            .or(match score {
                Value::Double(v) => Some(v),
                _ => None,
            })
            .ok_or_else(|| WorkshopError::UnexpectedReply("FT.SEARCH: bad score".into()))?;

        if let Some(tx) = document_from_fields(&fields)? {
            hits.push((tx, score));
        }
    }

    Ok((total, hits))
}

/// Field list of a JSON hit is `["$", "<document>"]`
fn document_from_fields(fields: &Value) -> Result<Option<Transaction>> {
    let Value::Array(pairs) = fields else {
        return Ok(None);
    };

    for pair in pairs.chunks(2) {
        if let [name, value] = pair {
            if text(name).as_deref() == Some("$") {
                if let Some(raw) = text(value) {
                    return Ok(Some(serde_json::from_str(&raw)?));
                }
            }
        }
    }

    Ok(None)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn to_distances(raw_hits: Vec<(Transaction, f64)>) -> Vec<SearchHit> {
    let best = raw_hits.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);

    raw_hits
        .into_iter()
        .map(|(transaction, score)| SearchHit {
            transaction,
            score: if best > 0.0 {
                (1.0 - score / best).clamp(0.0, 1.0)
            } else {
                1.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    fn hit(id: &str, score: &str, merchant: &str) -> Vec<Value> {
        vec![
            bulk(&format!("transaction:{id}")),
            bulk(score),
            Value::Array(vec![
                bulk("$"),
                bulk(&format!(
                    r#"{{"transactionId":"{id}","amount":10.0,"merchant":"{merchant}"}}"#
                )),
            ]),
        ]
    }

    #[test]
    fn test_build_query() {
        assert_eq!(
            build_query("coffee").as_deref(),
            Some("(coffee|@category:{coffee})")
        );
        assert_eq!(
            build_query("coffee shops").as_deref(),
            Some("(coffee|shops|@category:{coffee|shops})")
        );
        assert_eq!(build_query("   ").as_deref(), None);
        assert_eq!(
            build_query("7-eleven").as_deref(),
            Some("(7\\-eleven|@category:{7\\-eleven})")
        );
    }

    #[test]
    fn test_category_indexed_as_tag() {
        let at = INDEX_SCHEMA.iter().position(|part| *part == "$.category").unwrap();
        assert_eq!(&INDEX_SCHEMA[at..at + 4], &["$.category", "AS", "category", "TAG"]);
    }

    #[test]
    fn test_escape_term() {
        assert_eq!(escape_term("7-eleven"), "7\\-eleven");
        assert_eq!(escape_term("at&t"), "at\\&t");
        assert_eq!(escape_term("@category:{x}"), "\\@category\\:\\{x\\}");
        assert_eq!(escape_term("café"), "café");
    }

    #[test]
    fn test_parse_search_reply() {
        let mut items = vec![Value::Int(2)];
        items.extend(hit("TXN-1", "4", "Starbucks"));
        items.extend(hit("TXN-2", "1", "Peet's"));

        let (total, hits) = parse_search_reply(Value::Array(items)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.merchant.as_deref(), Some("Starbucks"));
        assert_eq!(hits[1].1, 1.0);

        let scored = to_distances(hits);
        assert_eq!(scored[0].score, 0.0);
        assert_eq!(scored[1].score, 0.75);
    }

    #[test]
    fn test_parse_search_reply_empty() {
        let (total, hits) = parse_search_reply(Value::Array(vec![Value::Int(0)])).unwrap();
        assert_eq!(total, 0);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_parse_search_reply_truncated() {
        let items = vec![Value::Int(1), bulk("transaction:TXN-1")];
        assert!(parse_search_reply(Value::Array(items)).is_err());
    }

    #[test]
    fn test_zero_scores_become_max_distance() {
        let tx: Transaction =
            serde_json::from_str(r#"{"transactionId":"TXN-9","amount":1.0}"#).unwrap();
        let scored = to_distances(vec![(tx, 0.0)]);
        assert_eq!(scored[0].score, 1.0);
    }

    #[test]
    fn test_hit_serializes_flat() {
        let tx: Transaction =
            serde_json::from_str(r#"{"transactionId":"TXN-7","amount":5.5,"merchant":"REI"}"#)
                .unwrap();
        let json = serde_json::to_value(SearchHit {
            transaction: tx,
            score: 0.25,
        })
        .unwrap();

        assert_eq!(json["transactionId"], "TXN-7");
        assert_eq!(json["merchant"], "REI");
        assert_eq!(json["score"], 0.25);
    }
}
