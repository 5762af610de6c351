//! Background sampling loop.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use hostglow_core::collector::{ReadError, SharedReader};
use hostglow_core::sampler::Pipeline;

/// Drives sampling cycles at a fixed interval.
///
/// Each reader runs in `spawn_blocking` under its own timeout, so one
/// stuck source (a wedged sensor, a hanging vendor tool) cannot stall
/// the cycle. Missed ticks are skipped, never bunched.
pub(crate) async fn sample_loop(
    readers: Vec<SharedReader>,
    mut pipeline: Pipeline,
    interval: Duration,
    reader_timeout: Duration,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // source_id is static per reader; resolve once so a read still holding
    // its lock after a timeout cannot block the loop here.
    let sources: Vec<(&'static str, SharedReader)> = readers
        .iter()
        .map(|r| {
            let id = r.lock().unwrap_or_else(|e| e.into_inner()).source_id();
            (id, Arc::clone(r))
        })
        .collect();

    let mut cycle_count: u64 = 0;

    loop {
        tick.tick().await;

        let t0 = Instant::now();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        pipeline.begin_cycle(now);

        for (source_id, reader) in &sources {
            let reader = Arc::clone(reader);
            let join = tokio::task::spawn_blocking(move || {
                let mut guard = reader.lock().unwrap_or_else(|e| e.into_inner());
                guard.read()
            });

            let outcome = match tokio::time::timeout(reader_timeout, join).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!(source = source_id, error = %e, "reader panicked in spawn_blocking");
                    continue;
                }
                Err(_) => Err(ReadError::Timeout {
                    after: reader_timeout,
                }),
            };
            pipeline.publish(source_id, outcome);
        }

        pipeline.end_cycle();
        cycle_count += 1;

        let elapsed = t0.elapsed();
        if cycle_count == 1 {
            info!(
                duration_ms = elapsed.as_millis() as u64,
                sources = sources.len(),
                "first sampling cycle complete"
            );
        } else {
            debug!(
                duration_ms = elapsed.as_millis() as u64,
                cycle_count, "cycle complete"
            );
        }

        if elapsed > interval / 2 {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "cycle exceeded 50% of interval"
            );
        }
    }
}
