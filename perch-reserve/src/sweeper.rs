use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::error;

use crate::service::ReservationService;

/// Periodically apply the Valid -> Expired sweep. The sweep is also
/// run lazily before history reads, so this loop only bounds how long
/// a stale row can linger.
pub async fn run_expiry_sweeper(service: Arc<ReservationService>, every: Duration) {
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        if let Err(err) = service.expire_overdue().await {
            error!(%err, "expiry sweep failed");
        }
    }
}
