//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     provides a unified interface to the barometric sensor and the status
//!     LED. abstracts away the difference between running on the real
//!     station hardware (using `rppal`) and a development machine (mocks).
//!
//! design philosophy:
//!     - "Compile Anywhere": the node should compile on Windows/Mac/Linux.
//!     - blocking reads: both implementations are synchronous; callers on
//!       the async runtime go through `tokio::task::spawn_blocking`.
//!
//! relationships:
//!     - used by: scheduler.rs (one sample per tick), server.rs (blink per
//!       handled request), main.rs (startup blink)
//!     - uses: rppal (on feature="hardware")
//!
//! ==============================================================================

use crate::error::SensorError;

/// One coherent set of values from the barometric sensor.
#[derive(Clone, Copy, Debug)]
pub struct BarometerSample {
    pub pascals: f64,
    pub celsius: f64,
    pub fahrenheit: f64,
    pub inches_mercury: f64,
}

impl BarometerSample {
    /// Derive the unit conversions from raw pascals and celsius.
    pub fn from_pa_and_celsius(pascals: f64, celsius: f64) -> Self {
        Self {
            pascals,
            celsius,
            fahrenheit: celsius * 9.0 / 5.0 + 32.0,
            inches_mercury: pascals * PA_TO_INHG,
        }
    }
}

/// Pa -> inches of mercury at 0°C
const PA_TO_INHG: f64 = 0.000_295_299_830_714;

pub trait Barometer: Send + Sync {
    fn read(&self) -> Result<BarometerSample, SensorError>;
}

/// Fire-and-forget visual signal. No return contract; a dead LED is not an
/// error anyone can act on.
pub trait StatusIndicator: Send + Sync {
    fn blink(&self, count: u8);
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For Non-Hardware Build)
// ==============================================================================================

#[cfg(not(feature = "hardware"))]
pub struct MockBarometer;

#[cfg(not(feature = "hardware"))]
impl MockBarometer {
    pub fn new() -> Self {
        tracing::info!("Using MOCK barometer (no hardware access)");
        Self
    }
}

#[cfg(not(feature = "hardware"))]
impl Default for MockBarometer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "hardware"))]
impl Barometer for MockBarometer {
    fn read(&self) -> Result<BarometerSample, SensorError> {
        tracing::debug!("[MOCK BMP085] Reading");
        Ok(BarometerSample::from_pa_and_celsius(99_875.0, 20.0))
    }
}

#[cfg(not(feature = "hardware"))]
pub struct MockIndicator;

#[cfg(not(feature = "hardware"))]
impl StatusIndicator for MockIndicator {
    fn blink(&self, count: u8) {
        tracing::debug!("[MOCK LED] Blink x{}", count);
    }
}

#[cfg(not(feature = "hardware"))]
pub fn barometer(_i2c_address: u8) -> anyhow::Result<std::sync::Arc<dyn Barometer>> {
    Ok(std::sync::Arc::new(MockBarometer::new()))
}

#[cfg(not(feature = "hardware"))]
pub fn indicator(_gpio_pin: u8) -> anyhow::Result<std::sync::Arc<dyn StatusIndicator>> {
    Ok(std::sync::Arc::new(MockIndicator))
}

// ==============================================================================================
// REAL IMPLEMENTATION (BMP085 over I2C, LED on GPIO)
// ==============================================================================================

#[cfg(feature = "hardware")]
mod bmp085 {
    use super::{BarometerSample, Barometer};
    use crate::error::SensorError;
    use std::sync::Mutex;
    use std::time::Duration;

    // Ultra high resolution mode, as the prototype hardware ran.
    const OVERSAMPLING: u8 = 3;

    const REG_CALIBRATION: u8 = 0xAA;
    const REG_CONTROL: u8 = 0xF4;
    const REG_DATA: u8 = 0xF6;
    const CMD_READ_TEMP: u8 = 0x2E;
    const CMD_READ_PRESSURE: u8 = 0x34;

    /// Factory calibration coefficients, read once from EEPROM.
    struct Calibration {
        ac1: i16,
        ac2: i16,
        ac3: i16,
        ac4: u16,
        ac5: u16,
        ac6: u16,
        b1: i16,
        b2: i16,
        mc: i16,
        md: i16,
    }

    pub struct Bmp085 {
        bus: Mutex<rppal::i2c::I2c>,
        cal: Calibration,
    }

    impl Bmp085 {
        pub fn new(address: u8) -> anyhow::Result<Self> {
            let mut bus = rppal::i2c::I2c::new()?;
            bus.set_slave_address(address as u16)?;

            let mut eeprom = [0u8; 22];
            bus.write(&[REG_CALIBRATION])?;
            bus.read(&mut eeprom)?;

            let word = |i: usize| ((eeprom[i] as u16) << 8) | eeprom[i + 1] as u16;
            let cal = Calibration {
                ac1: word(0) as i16,
                ac2: word(2) as i16,
                ac3: word(4) as i16,
                ac4: word(6),
                ac5: word(8),
                ac6: word(10),
                b1: word(12) as i16,
                b2: word(14) as i16,
                // MB at offset 16 is unused by the compensation algorithm
                mc: word(18) as i16,
                md: word(20) as i16,
            };

            tracing::info!("BMP085 ready (ultra high resolution)");
            Ok(Self {
                bus: Mutex::new(bus),
                cal,
            })
        }

        fn read_raw(&self) -> Result<(i32, i32), SensorError> {
            let mut bus = self
                .bus
                .lock()
                .map_err(|_| SensorError("i2c bus lock poisoned".into()))?;
            let io = |e: rppal::i2c::Error| SensorError(e.to_string());

            bus.write(&[REG_CONTROL, CMD_READ_TEMP]).map_err(io)?;
            std::thread::sleep(Duration::from_millis(5));
            let mut buf = [0u8; 2];
            bus.write(&[REG_DATA]).map_err(io)?;
            bus.read(&mut buf).map_err(io)?;
            let ut = ((buf[0] as i32) << 8) | buf[1] as i32;

            bus.write(&[REG_CONTROL, CMD_READ_PRESSURE + (OVERSAMPLING << 6)])
                .map_err(io)?;
            std::thread::sleep(Duration::from_millis(26));
            let mut buf = [0u8; 3];
            bus.write(&[REG_DATA]).map_err(io)?;
            bus.read(&mut buf).map_err(io)?;
            let up = (((buf[0] as i32) << 16) | ((buf[1] as i32) << 8) | buf[2] as i32)
                >> (8 - OVERSAMPLING);

            Ok((ut, up))
        }

        /// Datasheet compensation algorithm: raw values + calibration in,
        /// true temperature (0.1°C steps) and pressure (Pa) out.
        fn compensate(&self, ut: i32, up: i32) -> (f64, f64) {
            let c = &self.cal;
            let oss = OVERSAMPLING as i32;

            let x1 = ((ut - c.ac6 as i32) * c.ac5 as i32) >> 15;
            let x2 = ((c.mc as i32) << 11) / (x1 + c.md as i32);
            let b5 = x1 + x2;
            let celsius = ((b5 + 8) >> 4) as f64 / 10.0;

            let b6 = b5 - 4000;
            let x1 = (c.b2 as i32 * ((b6 * b6) >> 12)) >> 11;
            let x2 = (c.ac2 as i32 * b6) >> 11;
            let x3 = x1 + x2;
            let b3 = ((((c.ac1 as i32) * 4 + x3) << oss) + 2) / 4;
            let x1 = (c.ac3 as i32 * b6) >> 13;
            let x2 = (c.b1 as i32 * ((b6 * b6) >> 12)) >> 16;
            let x3 = ((x1 + x2) + 2) >> 2;
            let b4 = ((c.ac4 as u32) * ((x3 + 32768) as u32)) >> 15;
            let b7 = ((up - b3) as u32) * (50000u32 >> oss);
            let p = if b7 < 0x8000_0000 {
                ((b7 * 2) / b4) as i32
            } else {
                ((b7 / b4) * 2) as i32
            };
            let x1 = (p >> 8) * (p >> 8);
            let x1 = (x1 * 3038) >> 16;
            let x2 = (-7357 * p) >> 16;
            let pascals = (p + ((x1 + x2 + 3791) >> 4)) as f64;

            (celsius, pascals)
        }
    }

    impl Barometer for Bmp085 {
        fn read(&self) -> Result<BarometerSample, SensorError> {
            let (ut, up) = self.read_raw()?;
            let (celsius, pascals) = self.compensate(ut, up);
            Ok(BarometerSample::from_pa_and_celsius(pascals, celsius))
        }
    }
}

#[cfg(feature = "hardware")]
pub struct GpioIndicator {
    pin: u8,
}

#[cfg(feature = "hardware")]
impl GpioIndicator {
    pub fn new(pin: u8) -> anyhow::Result<Self> {
        // probe once so a miswired pin surfaces at startup, not on first blink
        let gpio = rppal::gpio::Gpio::new()?;
        gpio.get(pin)?;
        Ok(Self { pin })
    }
}

#[cfg(feature = "hardware")]
impl StatusIndicator for GpioIndicator {
    fn blink(&self, count: u8) {
        let run = || -> anyhow::Result<()> {
            let gpio = rppal::gpio::Gpio::new()?;
            let mut led = gpio.get(self.pin)?.into_output();
            for _ in 0..count {
                led.set_high();
                std::thread::sleep(std::time::Duration::from_millis(200));
                led.set_low();
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
            Ok(())
        };
        if let Err(e) = run() {
            tracing::debug!("[LED] blink failed: {}", e);
        }
    }
}

#[cfg(feature = "hardware")]
pub fn barometer(i2c_address: u8) -> anyhow::Result<std::sync::Arc<dyn Barometer>> {
    Ok(std::sync::Arc::new(bmp085::Bmp085::new(i2c_address)?))
}

#[cfg(feature = "hardware")]
pub fn indicator(gpio_pin: u8) -> anyhow::Result<std::sync::Arc<dyn StatusIndicator>> {
    Ok(std::sync::Arc::new(GpioIndicator::new(gpio_pin)?))
}
