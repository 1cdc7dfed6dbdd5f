// Banking Workshop - Redis connection
//
// One `ConnectionManager` per process. It multiplexes commands over a single
// connection and reconnects on its own, so it is cloned wherever it is needed
// instead of being wrapped in a lock.

use std::time::Duration;

use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    Client,
};
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::error::{Result, WorkshopError};

pub async fn connect(config: &RedisConfig) -> Result<ConnectionManager> {
    let manager_config = ConnectionManagerConfig::new()
        .set_number_of_retries(3)
        .set_connection_timeout(Duration::from_secs(10));

    let connection_error = |source| WorkshopError::Connection {
        host: config.host.clone(),
        port: config.port,
        source,
    };

    debug!(host = %config.host, port = config.port, tls = config.use_ssl, "Opening Redis client");
    let client = Client::open(config.url()).map_err(connection_error)?;

    let mut conn = client
        .get_connection_manager_with_config(manager_config)
        .await
        .map_err(connection_error)?;

    ping(&mut conn).await.map_err(|e| match e {
        WorkshopError::Redis(source) => connection_error(source),
        other => other,
    })?;

    info!("Connected to Redis at {}:{}", config.host, config.port);

    Ok(conn)
}

pub async fn ping(conn: &mut ConnectionManager) -> Result<()> {
    let reply: String = redis::cmd("PING").query_async(conn).await?;

    if reply != "PONG" {
        return Err(WorkshopError::UnexpectedReply(format!("PING answered {reply:?}")));
    }

    Ok(())
}
