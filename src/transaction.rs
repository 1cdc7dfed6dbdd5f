// Banking Workshop - Transaction model
//
// One card transaction as it travels through the system:
//   stream entry (flat string pairs) → Transaction → JSON document `transaction:{id}`

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::error::{Result, WorkshopError};

/// Card transaction
///
/// Field names follow the camelCase layout of the stored JSON documents.
/// Only `transactionId` is required; everything else is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,

    #[serde(default)]
    pub customer_id: Option<String>,

    #[serde(default)]
    pub amount: f64,

    #[serde(default)]
    pub merchant: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    /// Epoch milliseconds, 0 when unknown
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub card_last4: Option<String>,
}

impl Transaction {
    /// Build a transaction from the field/value pairs of a stream entry
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let transaction_id = fields
            .get("transactionId")
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WorkshopError::InvalidTransaction("missing transactionId".into()))?
            .to_string();

        let amount = match non_empty(fields, "amount") {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                WorkshopError::InvalidTransaction(format!("{transaction_id}: bad amount {raw:?}"))
            })?,
            None => 0.0,
        };

        let timestamp = match non_empty(fields, "timestamp") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                WorkshopError::InvalidTransaction(format!(
                    "{transaction_id}: bad timestamp {raw:?}"
                ))
            })?,
            None => 0,
        };

        Ok(Self {
            transaction_id,
            customer_id: non_empty(fields, "customerId"),
            amount,
            merchant: non_empty(fields, "merchant"),
            category: non_empty(fields, "category"),
            timestamp,
            location: non_empty(fields, "location"),
            card_last4: non_empty(fields, "cardLast4"),
        })
    }

    /// Flatten into stream field/value pairs (inverse of `from_fields`)
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("transactionId", self.transaction_id.clone()),
            ("amount", self.amount.to_string()),
            ("timestamp", self.timestamp.to_string()),
        ];

        let optional = [
            ("customerId", &self.customer_id),
            ("merchant", &self.merchant),
            ("category", &self.category),
            ("location", &self.location),
            ("cardLast4", &self.card_last4),
        ];

        for (name, value) in optional {
            if let Some(value) = value {
                fields.push((name, value.clone()));
            }
        }

        fields
    }

    /// Merchant name used for aggregation
    pub fn merchant_or_unknown(&self) -> &str {
        self.merchant.as_deref().unwrap_or("Unknown")
    }

    /// Deterministic id derived from the content fields
    ///
    /// Used when an imported row has no id, so importing the same file twice
    /// produces the same ids.
    pub fn compute_content_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.timestamp,
            self.amount,
            self.merchant.as_deref().unwrap_or(""),
            self.customer_id.as_deref().unwrap_or(""),
            self.card_last4.as_deref().unwrap_or(""),
        ));
        let digest = format!("{:x}", hasher.finalize());
        format!("TXN-{}", &digest[..16].to_uppercase())
    }
}

fn non_empty(fields: &HashMap<String, String>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One CSV row; the id may be blank
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRecord {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    amount: f64,
    #[serde(default)]
    merchant: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    card_last4: Option<String>,
}

impl From<CsvRecord> for Transaction {
    fn from(record: CsvRecord) -> Self {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let mut tx = Transaction {
            transaction_id: String::new(),
            customer_id: blank_to_none(record.customer_id),
            amount: record.amount,
            merchant: blank_to_none(record.merchant),
            category: blank_to_none(record.category),
            timestamp: record.timestamp.unwrap_or(0),
            location: blank_to_none(record.location),
            card_last4: blank_to_none(record.card_last4),
        };

        tx.transaction_id = match blank_to_none(record.transaction_id) {
            Some(id) => id,
            None => tx.compute_content_id(),
        };

        tx
    }
}

pub fn load_csv(csv_path: &Path) -> anyhow::Result<Vec<Transaction>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    read_csv(file)
}

pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut transactions = Vec::new();

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        // +2: header row and 1-based numbering
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line + 2))?;
        transactions.push(record.into());
    }

    Ok(transactions)
}
