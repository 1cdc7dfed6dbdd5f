// Banking Workshop - Error types
//
// Library code returns `Result<T>` with `WorkshopError`. Binaries wrap these in anyhow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Unexpected reply from Redis: {0}")]
    UnexpectedReply(String),

    #[error("Failed to connect to Redis at {host}:{port}. Make sure Redis is running. Error: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: redis::RedisError,
    },
}

pub type Result<T, E = WorkshopError> = std::result::Result<T, E>;
