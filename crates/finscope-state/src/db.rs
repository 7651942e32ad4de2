use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::Result;

/// Open a Redis connection manager, retrying transparently on transient
/// disconnects (the `ConnectionManager` reconnects internally).
///
/// Safe to call once at startup; the returned handle is cheap to clone
/// and share across tasks.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    info!(url, "connecting to redis");
    let client = redis::Client::open(url)?;
    let manager = client.get_connection_manager().await?;
    Ok(manager)
}
