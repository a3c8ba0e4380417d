//! Expiration sweeper
//!
//! The bidding service only observes deadlines lazily, when someone touches
//! a session. This background task periodically force-expires overdue
//! sessions so that an abandoned bidding war still settles.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::bidding::BiddingService;

pub fn spawn_expiration_sweeper(service: Arc<BiddingService>, interval_seconds: u64) {
    tokio::spawn(async move {
        info!(
            "Expiration sweeper started (interval: {}s)",
            interval_seconds
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        // The first tick fires immediately; that's fine, a fresh boot should
        // settle anything that expired while the service was down.
        loop {
            ticker.tick().await;
            match service.sweep_expired_sessions().await {
                Ok(0) => debug!("Expiration sweep: nothing to do"),
                Ok(n) => info!("Expiration sweep: {} session(s) expired", n),
                Err(e) => error!("Expiration sweep failed: {}", e),
            }
        }
    });
}
