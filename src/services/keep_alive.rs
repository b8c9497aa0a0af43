// src/services/keep_alive.rs - Periodic self-ping
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::config::KeepAliveConfig;
use crate::services::{http_client, OUTBOUND_TIMEOUT};

pub fn ping_url(base_url: &str) -> String {
    format!("{}/ping", base_url.trim_end_matches('/'))
}

/// Pings `{base_url}/ping` forever; failures are logged and retried on the next tick
pub fn spawn(config: &KeepAliveConfig, base_url: &str) -> Option<JoinHandle<()>> {
    if !config.enabled {
        debug!("Keep-alive disabled");
        return None;
    }

    let url = ping_url(base_url);
    let every = Duration::from_secs(config.interval_secs.max(1));
    let client = match http_client(OUTBOUND_TIMEOUT.min(every)) {
        Ok(client) => client,
        Err(e) => {
            warn!("Keep-alive disabled: {}", e);
            return None;
        }
    };
    info!("Keep-alive pinging {} every {:?}", url, every);

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => debug!("Keep-alive ping: {}", response.status()),
                Err(e) => warn!("Keep-alive ping to {} failed: {}", url, e),
            }
        }
    }))
}
