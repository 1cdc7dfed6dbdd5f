// Redis key layout shared by the processor, API and dashboard

/// Stream the generator and importer publish raw transactions to
pub const TRANSACTION_STREAM: &str = "transactions:stream";

/// List of transaction ids, newest first
pub const ORDERED_TRANSACTIONS: &str = "transactions:ordered";

/// Prefix of the JSON transaction documents
pub const TRANSACTION_PREFIX: &str = "transaction:";

/// Sorted set: category -> total spent
pub const SPENDING_CATEGORIES: &str = "spending:categories";

/// Prefix of the per-category sorted sets: merchant -> total spent
pub const SPENDING_CATEGORY_PREFIX: &str = "spending:category:";

/// Time series of all spending
pub const SPENDING_TIMESERIES: &str = "spending:timeseries";

/// Search index over the transaction documents
pub const TRANSACTION_INDEX: &str = "idx:transactions";

pub fn transaction(id: &str) -> String {
    format!("{TRANSACTION_PREFIX}{id}")
}

pub fn category_merchants(category: &str) -> String {
    format!("{SPENDING_CATEGORY_PREFIX}{category}")
}

pub fn category_timeseries(category: &str) -> String {
    format!("{SPENDING_TIMESERIES}:{category}")
}
