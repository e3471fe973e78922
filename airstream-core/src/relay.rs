use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::RelaySection;

/// Returns `true` when a TCP connection to the relay opens within `limit`.
pub async fn is_reachable(host: &str, port: u16, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            debug!(host, port, "relay is accepting connections");
            true
        }
        Ok(Err(error)) => {
            warn!(host, port, %error, "relay refused connection");
            false
        }
        Err(_) => {
            warn!(host, port, timeout_ms = limit.as_millis() as u64, "relay connect timed out");
            false
        }
    }
}

pub async fn check_relay(relay: &RelaySection) -> bool {
    is_reachable(&relay.host, relay.check_port, relay.connect_timeout()).await
}
