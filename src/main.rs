//! ==============================================================================
//! main.rs - weather node entry point
//! ==============================================================================
//!
//! purpose:
//!     composition root. wires the collaborators together and starts the two
//!     long-lived loops.
//!
//! responsibilities:
//!     - load configuration (config/station.toml or defaults)
//!     - initialize logging
//!     - synchronize the clock once over UDP (fatal if it fails: with no
//!       RTC the device has no usable time without it)
//!     - start the sampling scheduler on its own task
//!     - run the request server accept loop on the main task (bind failure
//!       is fatal - the device has no purpose without its socket)
//!
//! relationships:
//!     - uses: timesync.rs (boot sync), scheduler.rs, server.rs, hal.rs
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;

use weather_node::config::NodeConfig;
use weather_node::store::ReadingLog;
use weather_node::timesync::NodeClock;
use weather_node::upload::{Uploader, WeatherUploader};
use weather_node::{hal, scheduler, server, timesync, NodeContext};

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Weather Node - barometric telemetry station");
    println!("===========================================================");

    // step 1: load configuration
    let config = NodeConfig::load_or_default();
    config.print_summary();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    // step 2: hardware collaborators (mocks unless built with "hardware")
    let sensor = hal::barometer(config.hardware.i2c_address)
        .context("failed to initialize barometer")?;
    let indicator = hal::indicator(config.hardware.led_gpio_pin)
        .context("failed to initialize status LED")?;

    // boot signal, same as the prototype: three blinks before first sync
    {
        let indicator = indicator.clone();
        tokio::task::spawn_blocking(move || indicator.blink(3)).await.ok();
    }

    // step 3: one-shot clock synchronization. no retry - either we get
    // exactly one synchronized time or startup fails.
    tracing::info!("[STARTUP] Synchronizing clock against {}", config.time_sync.server);
    let synced = timesync::synchronize(&config.time_sync.server, config.time_sync.timeout())
        .await
        .context("time synchronization failed")?;
    let clock = NodeClock::started_at(synced);
    tracing::info!("[STARTUP] Clock set to {}", synced.format("%Y-%m-%d %H:%M:%S%.3f UTC"));

    // step 4: remaining collaborators and the shared context
    let uploader: Option<Arc<dyn Uploader>> = if config.upload.enabled {
        Some(Arc::new(WeatherUploader::new(config.upload.clone())))
    } else {
        tracing::info!("[STARTUP] Upload disabled");
        None
    };

    let log = ReadingLog::new(&config.storage.log_path);
    let port = config.server.port;

    let ctx = Arc::new(NodeContext {
        config,
        clock,
        sensor,
        indicator,
        uploader,
        log,
    });

    // step 5: scheduler on its own task, accept loop on this one
    tokio::spawn(scheduler::run(ctx.clone()));

    let listener = server::bind(port).await.context("failed to bind listening socket")?;
    server::serve(ctx, listener).await
}
