use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::model::Ms;
use crate::observability::LAPSED_TOTAL;

const LAPSE_REASON: &str = "tentative booking expired";

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Background task that periodically rejects tentative bookings whose
/// lapse deadline has passed.
pub async fn run_reaper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        let lapsed = engine.collect_lapsed_tentative(now_ms());
        for (booking_id, _room_id) in lapsed {
            match engine.reject_booking(booking_id, LAPSE_REASON.into()).await {
                Ok(_) => {
                    metrics::counter!(LAPSED_TOTAL).increment(1);
                    info!("lapsed tentative booking {booking_id}");
                }
                Err(e) => {
                    // May already have been confirmed or cancelled — that's fine
                    tracing::debug!("reaper skip {booking_id}: {e}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::warn!("WAL compaction failed: {e}"),
        }
    }
}
