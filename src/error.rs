//! ==============================================================================
//! error.rs - failure taxonomy
//! ==============================================================================
//!
//! purpose:
//!     one type per failure class, so each call site can apply the right
//!     severity policy:
//!     - NetworkError / ProtocolDecodeError: fatal to the single time-sync
//!       attempt, never retried automatically
//!     - SensorError: aborts the current scheduler tick, next tick proceeds
//!     - UploadError: logged and discarded, never blocks the device
//!     - StorageError: logged, the request/tick proceeds with empty data
//!
//! ```text
//!     bind/listen failure at server startup is the only process-fatal
//!     condition; it is propagated as anyhow out of main, not modeled here.
//! ```
//!
//! ==============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of one network operation during time sync. Each phase gets its
/// own variant so the log says which step died.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("name resolution for {host} failed: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no address found for {host}")]
    NoAddress { host: String },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("receive timed out after {0:?}")]
    ReceiveTimeout(Duration),
}

/// Malformed or truncated time-sync response.
#[derive(Debug, Error)]
pub enum ProtocolDecodeError {
    #[error("time-sync response truncated: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
}

/// Everything that can make a single synchronization attempt fail.
#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Decode(#[from] ProtocolDecodeError),
}

/// Sensor read failure. Aborts the current tick only.
#[derive(Debug, Error)]
#[error("sensor read failed: {0}")]
pub struct SensorError(pub String);

/// Outbound push to the aggregation service failed.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload rejected with http status {0}")]
    Status(u16),
}

/// Append or read failure on the reading log.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("append to {path} failed: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
