//! ==============================================================================
//! weather-node - standalone weather telemetry node
//! ==============================================================================
//!
//! purpose:
//!     a network-connected telemetry node for a small station: synchronizes
//!     wall-clock time over UDP at boot (the device has no battery-backed
//!     RTC), samples an attached barometric sensor on a fixed interval, and
//!     serves the accumulated reading log to one client at a time over a
//!     bespoke text request protocol.
//!
//! architecture:
//!
//! ```text
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                     weather-node                         │
//!     │  ┌─────────────┐  ┌──────────────┐  ┌────────────────┐  │
//!     │  │ time sync   │  │  scheduler   │  │ request server │  │
//!     │  │ (UDP, boot) │  │ (15s ticks)  │  │ (TCP port 80)  │  │
//!     │  └──────┬──────┘  └──────┬───────┘  └───────┬────────┘  │
//!     │         │                │    append        │ read       │
//!     │         ▼                ▼                  ▼            │
//!     │     NodeClock        ReadingLog (append-only, guarded)   │
//!     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ```text
//!     the scheduler and the server run concurrently and share only the
//!     reading log; the log serializes appends against whole-file reads.
//! ```
//!
//! ==============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod hal;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod timesync;
pub mod upload;

use std::sync::Arc;

use config::NodeConfig;
use hal::{Barometer, StatusIndicator};
use store::ReadingLog;
use timesync::NodeClock;
use upload::Uploader;

/// Everything the long-lived loops need, built once at startup and passed
/// by reference. Replaces the prototype's ambient statics.
pub struct NodeContext {
    pub config: NodeConfig,
    pub clock: NodeClock,
    pub sensor: Arc<dyn Barometer>,
    pub indicator: Arc<dyn StatusIndicator>,
    /// None when uploads are disabled in config.
    pub uploader: Option<Arc<dyn Uploader>>,
    pub log: ReadingLog,
}
