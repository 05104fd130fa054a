use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::time::interval;

use crate::engine::PollEngine;
use crate::error::EngineResult;

/// Floor on the sweep interval; callers asking for less get clamped up.
pub const MIN_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Background loop that auto-closes polls whose window has passed. Runs until
/// the surrounding task is dropped.
pub async fn run_sweeper(engine: Arc<PollEngine>, every: StdDuration) {
    let every = every.max(MIN_SWEEP_INTERVAL);
    info!("starting expired-poll sweeper, interval {every:?}");
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;
        match sweep_once(&engine, Utc::now()).await {
            Ok(0) => {}
            Ok(closed) => info!("sweeper closed {closed} expired poll(s)"),
            Err(e) => error!("expired-poll sweep failed: {e}"),
        }
    }
}

/// One sweep pass: closes every active poll past its end time. Idempotent —
/// a poll already closed by a concurrent sweep or a manual call is skipped
/// without error.
pub async fn sweep_once(engine: &PollEngine, now: DateTime<Utc>) -> EngineResult<u32> {
    let expired = engine.expired_active_polls(now).await?;
    let mut closed = 0;
    for poll_id in expired {
        match engine.sweep_close(&poll_id).await {
            Ok(()) => closed += 1,
            Err(e) => error!("failed to close expired poll {poll_id}: {e}"),
        }
    }
    Ok(closed)
}
