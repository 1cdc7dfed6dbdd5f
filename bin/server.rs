// Banking Workshop - Web Server
// REST API over the processor modules' Redis data, plus the static UI

use anyhow::Result;
use banking_workshop::{api, logging, redis_client, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info,tower_http=info");

    let config = Config::from_env();

    info!("🏦 Banking Workshop API v{}", banking_workshop::VERSION);
    info!(
        "Redis: {}:{} (tls: {})",
        config.redis.host, config.redis.port, config.redis.use_ssl
    );

    let redis = match redis_client::connect(&config.redis).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };

    api::serve(&config, redis).await
}
