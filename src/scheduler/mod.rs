//! Wakeup-driven polling loop.
//!
//! The scheduler owns the cadence of the whole service: each tick it
//! drains the due queue with bounded parallelism, then sleeps until the
//! earliest scheduled fetch or one full tick, whichever comes first.
//! The cap on the sleep keeps newly subscribed feeds from waiting more
//! than a tick before their first scheduled poll.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::app::{AppContext, Result};
use crate::config::PollConfig;
use crate::processor;
use crate::store::Store;

/// Run the polling loop forever. Tick failures are logged and the loop
/// carries on; only process termination stops it.
pub async fn run(ctx: Arc<AppContext>) {
    info!("scheduler started");
    loop {
        if let Err(e) = tick(&ctx).await {
            warn!(error = %e, "scheduler tick failed");
        }

        let wake = next_wake(ctx.store.as_ref(), &ctx.config.poll);
        tokio::time::sleep(wake).await;
    }
}

/// Process every due feed once. Feeds are dispatched in schedule order
/// (never-polled feeds first) and at most `concurrency` run at a time.
/// A failing feed never cancels its siblings.
pub async fn tick(ctx: &Arc<AppContext>) -> Result<()> {
    let due = ctx.store.due_feeds(Utc::now())?;
    if due.is_empty() {
        return Ok(());
    }
    debug!(count = due.len(), "dispatching due feeds");

    let semaphore = Arc::new(Semaphore::new(ctx.config.poll.concurrency));
    let mut handles = Vec::with_capacity(due.len());

    for feed_url in due {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("Semaphore closed");

            match processor::process_feed(&ctx, &feed_url, None).await {
                Ok(Some(outcome)) if outcome.inserted > 0 => {
                    info!(feed = %outcome.feed_url, inserted = outcome.inserted, "new items");
                }
                Ok(_) => {}
                Err(e) => warn!(feed = %feed_url, error = %e, "feed processing failed"),
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("task join error: {}", e);
        }
    }

    Ok(())
}

/// How long to sleep before the next tick: until the earliest scheduled
/// fetch, but never longer than one tick and never negative.
pub fn next_wake(store: &dyn Store, cfg: &PollConfig) -> Duration {
    let now = Utc::now();
    match store.earliest_future_fetch(now) {
        Ok(Some(next)) => {
            let tick_ms = cfg.tick.as_millis() as i64;
            let wait_ms = (next - now).num_milliseconds().clamp(0, tick_ms);
            Duration::from_millis(wait_ms as u64)
        }
        Ok(None) => cfg.tick,
        Err(e) => {
            warn!(error = %e, "failed to query next fetch time");
            cfg.tick
        }
    }
}
