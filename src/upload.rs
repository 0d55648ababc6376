//! ==============================================================================
//! upload.rs - weather aggregation upload collaborator
//! ==============================================================================
//!
//! purpose:
//!     pushes one composed reading per tick to the aggregation service. the
//!     URL format is bit-exact to what that service expects: unpadded UTC
//!     date/time components, `:` pre-encoded as `%3A`, and a fixed query
//!     field order.
//!
//! relationships:
//!     - used by: scheduler.rs (one push per tick, via spawn_blocking -
//!       failures are logged and discarded, never fatal)
//!     - config: config.rs (UploadConfig: base_url, station id, password)
//!
//! ==============================================================================

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::config::UploadConfig;
use crate::error::UploadError;

pub trait Uploader: Send + Sync {
    /// Push one composed reading. Blocking; callers on the async runtime go
    /// through `tokio::task::spawn_blocking`.
    fn push(&self, report: &Report) -> Result<(), UploadError>;
}

/// The fields the aggregation service wants per update.
#[derive(Clone, Copy, Debug)]
pub struct Report {
    pub at: DateTime<Utc>,
    pub fahrenheit: f64,
    /// sea-level corrected pressure
    pub baromin: f64,
    /// realtime update cadence advertised to the service
    pub rtfreq_seconds: u64,
}

pub struct WeatherUploader {
    config: UploadConfig,
}

impl WeatherUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Compose the update URL. Field order and the `%3A` time separators
    /// must not change; the remote service parses this shape exactly.
    pub fn compose_url(&self, report: &Report) -> String {
        let t = report.at;
        format!(
            "{}?ID={}&PASSWORD={}&dateutc={}-{}-{}+{}%3A{}%3A{}&tempf={}&baromin={}&action=updateraw&realtime=1&rtfreq={}",
            self.config.base_url,
            self.config.station_id,
            self.config.password,
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            report.fahrenheit,
            report.baromin,
            report.rtfreq_seconds,
        )
    }
}

impl Uploader for WeatherUploader {
    fn push(&self, report: &Report) -> Result<(), UploadError> {
        let url = self.compose_url(report);
        tracing::debug!("[UPLOAD] {}", url);

        // One connection per update, like the prototype: no keep-alive, and
        // a fresh client keeps this safely on the blocking thread.
        let client = reqwest::blocking::Client::new();
        let response = client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let body = response.text().unwrap_or_default();
        tracing::debug!("[UPLOAD] service replied: {}", body.trim());
        Ok(())
    }
}
