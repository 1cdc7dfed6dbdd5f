// Banking Workshop - Logging
//
// RUST_LOG wins when set; otherwise `default_directive` applies.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
