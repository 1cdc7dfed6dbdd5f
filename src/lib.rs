// Banking Workshop - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod dashboard;
pub mod error;
pub mod generator;
pub mod keys;
pub mod logging;
pub mod modules;      // Processor modules: one Redis data structure each
pub mod redis_client;
pub mod status;       // Unlock flags for the UI
pub mod stream;       // Transaction stream producer + processor loop
pub mod transaction;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{Config, RedisConfig};
pub use error::{Result, WorkshopError};
pub use modules::{process_transaction, ProcessOutcome};
pub use status::{DebugInfo, UnlockStatus};
pub use stream::{Processor, ProcessorStats};
pub use transaction::{load_csv, Transaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
