//! ==============================================================================
//! scheduler.rs - periodic sampling scheduler
//! ==============================================================================
//!
//! purpose:
//!     drives the sample-upload-record cycle: first tick immediately, then
//!     one every `interval_seconds`, for the life of the process.
//!
//! re-entrancy:
//!     ticks never overlap. the loop awaits each tick body to completion
//!     before asking the interval for the next one, and the interval is set
//!     to Delay on overrun - a slow tick pushes the next one back, it is
//!     never skipped or run in parallel.
//!
//! failure policy per tick:
//!     - sensor read failure aborts the tick; the next tick proceeds
//!     - upload failure is logged and discarded
//!     - log append failure is logged and discarded
//!
//! relationships:
//!     - spawned by: main.rs (own task, independent of the accept loop)
//!     - uses: hal.rs (sample + blink), upload.rs, store.rs, domain.rs
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};

use crate::domain::SensorReading;
use crate::upload::Report;
use crate::NodeContext;

/// Run the sampling loop forever. No stop operation: the scheduler is
/// process-lifetime-bound, like the device it replaces.
pub async fn run(ctx: Arc<NodeContext>) {
    let interval = Duration::from_secs(ctx.config.sampling.interval_seconds);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "[SCHEDULER] Sampling every {}s",
        ctx.config.sampling.interval_seconds
    );

    loop {
        // first call fires immediately, so the first sample lands at boot
        ticker.tick().await;
        tick(&ctx).await;
    }
}

/// One scheduler tick: sample, correct, upload, record, blink.
async fn tick(ctx: &NodeContext) {
    let sensor = ctx.sensor.clone();
    let sample = match tokio::task::spawn_blocking(move || sensor.read()).await {
        Ok(Ok(sample)) => sample,
        Ok(Err(e)) => {
            tracing::warn!("[SCHEDULER] {} - skipping tick", e);
            return;
        }
        Err(e) => {
            tracing::warn!("[SCHEDULER] sensor task join error: {} - skipping tick", e);
            return;
        }
    };

    let reading = SensorReading::from_sample(sample, ctx.clock.now());
    if ctx.config.logging.show_sensor_data {
        tracing::info!(
            "[SCHEDULER] {} | {:.0} Pa | {:.2} inHg | {:.2}°C | {:.2}°F",
            reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
            reading.pascals,
            reading.inches_mercury,
            reading.celsius,
            reading.fahrenheit
        );
    }

    let baromin = reading.sea_level_inches_mercury(ctx.config.sampling.elevation_meters);

    if let Some(uploader) = &ctx.uploader {
        let uploader = uploader.clone();
        let report = Report {
            at: reading.timestamp,
            fahrenheit: reading.fahrenheit,
            baromin,
            rtfreq_seconds: ctx.config.sampling.interval_seconds,
        };
        let pushed = tokio::task::spawn_blocking(move || uploader.push(&report)).await;
        match pushed {
            Ok(Ok(())) => tracing::debug!("[SCHEDULER] upload ok"),
            Ok(Err(e)) => tracing::warn!("[SCHEDULER] {}", e),
            Err(e) => tracing::warn!("[SCHEDULER] upload task join error: {}", e),
        }
    }

    if let Err(e) = ctx.log.append(&reading.log_line()).await {
        tracing::warn!("[SCHEDULER] {}", e);
    }

    let indicator = ctx.indicator.clone();
    tokio::task::spawn_blocking(move || indicator.blink(1))
        .await
        .ok();
}
