use chrono::{DateTime, Utc};

use crate::hal::BarometerSample;

/// one barometer sample stamped with wall-clock time.
/// transient: formatted for upload and the reading log, never retained.
#[derive(Clone, Debug)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub pascals: f64,
    pub celsius: f64,
    pub fahrenheit: f64,
    pub inches_mercury: f64,
}

impl SensorReading {
    pub fn from_sample(sample: BarometerSample, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            pascals: sample.pascals,
            celsius: sample.celsius,
            fahrenheit: sample.fahrenheit,
            inches_mercury: sample.inches_mercury,
        }
    }

    /// station pressure corrected to sea level, in inches of mercury.
    ///
    /// correction = (1 - (0.0065*e) / (tempC + 0.0065*e + 273.15))^-5.257
    pub fn sea_level_inches_mercury(&self, elevation_meters: f64) -> f64 {
        let ratio =
            1.0 - (0.0065 * elevation_meters) / (self.celsius + 0.0065 * elevation_meters + 273.15);
        self.inches_mercury * ratio.powf(-5.257)
    }

    /// one log record: timestamp, Pa, inHg (2dp), °C (2dp), °F (2dp).
    /// field order and precision are part of the `raw` wire contract.
    pub fn log_line(&self) -> String {
        format!(
            "{},{},{:.2},{:.2},{:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.pascals,
            self.inches_mercury,
            self.celsius,
            self.fahrenheit
        )
    }
}
