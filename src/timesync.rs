//! ==============================================================================
//! timesync.rs - UDP time synchronization client
//! ==============================================================================
//!
//! purpose:
//!     the station has no battery-backed RTC, so wall-clock time comes from
//!     one NTP exchange at boot. one request, one response, no retries.
//!
//! # Protocol
//!
//! **Port:** 123 (UDP)
//!
//! **Packet:** 48 bytes, identical layout for request and response
//! - `[0]`     Version/mode marker: 0x1B = version 3, client mode
//! - `[1-39]`  Zero on request; header fields we do not inspect on response
//! - `[40-43]` Transmit timestamp, integer seconds since 1900-01-01 (u32, BE)
//! - `[44-47]` Transmit timestamp, fractional seconds (u32, BE)
//!
//! relationships:
//!     - used by: main.rs (once at startup, before the scheduler spins up)
//!     - errors: error.rs (NetworkError per phase, ProtocolDecodeError)
//!
//! ==============================================================================

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use tokio::net::UdpSocket;

use crate::error::{NetworkError, ProtocolDecodeError, TimeSyncError};

/// NTP packet size
pub const PACKET_LEN: usize = 48;

/// Version 3, client mode
const CLIENT_MODE_MARKER: u8 = 0x1B;

/// Byte offset of the transmit timestamp field
const TRANSMIT_OFFSET: usize = 40;

/// NTP port on the time server
const NTP_PORT: u16 = 123;

/// Perform a single-shot time synchronization against `server`.
///
/// Resolves the host, sends one 48-byte request, and blocks on one receive.
/// With `timeout = None` the receive waits forever; a dead time server then
/// stalls startup, which is the accepted fault mode on this platform.
pub async fn synchronize(
    server: &str,
    timeout: Option<Duration>,
) -> Result<DateTime<Utc>, TimeSyncError> {
    let addr = tokio::net::lookup_host((server, NTP_PORT))
        .await
        .map_err(|e| NetworkError::Resolve {
            host: server.to_string(),
            source: e,
        })?
        .next()
        .ok_or_else(|| NetworkError::NoAddress {
            host: server.to_string(),
        })?;

    // Bind to an ephemeral local port; the socket closes on every exit path
    // when it drops.
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| NetworkError::Connect { addr, source: e })?;
    socket
        .connect(addr)
        .await
        .map_err(|e| NetworkError::Connect { addr, source: e })?;

    let mut packet = [0u8; PACKET_LEN];
    packet[0] = CLIENT_MODE_MARKER;

    socket.send(&packet).await.map_err(NetworkError::Send)?;

    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, socket.recv(&mut packet))
            .await
            .map_err(|_| NetworkError::ReceiveTimeout(limit))?
            .map_err(NetworkError::Receive)?,
        None => socket.recv(&mut packet).await.map_err(NetworkError::Receive)?,
    };

    Ok(decode_transmit_timestamp(&packet[..received])?)
}

/// Decode the transmit timestamp of a time-sync response into an absolute
/// calendar time.
///
/// `milliseconds = seconds * 1000 + fraction * 1000 / 2^32`, anchored at
/// 1900-01-01T00:00:00Z.
pub fn decode_transmit_timestamp(packet: &[u8]) -> Result<DateTime<Utc>, ProtocolDecodeError> {
    if packet.len() < PACKET_LEN {
        return Err(ProtocolDecodeError::Truncated {
            got: packet.len(),
            need: PACKET_LEN,
        });
    }

    let seconds = u32::from_be_bytes([
        packet[TRANSMIT_OFFSET],
        packet[TRANSMIT_OFFSET + 1],
        packet[TRANSMIT_OFFSET + 2],
        packet[TRANSMIT_OFFSET + 3],
    ]) as u64;
    let fraction = u32::from_be_bytes([
        packet[TRANSMIT_OFFSET + 4],
        packet[TRANSMIT_OFFSET + 5],
        packet[TRANSMIT_OFFSET + 6],
        packet[TRANSMIT_OFFSET + 7],
    ]) as u64;

    let milliseconds = seconds * 1000 + (fraction * 1000) / (1u64 << 32);

    Ok(protocol_epoch() + chrono::Duration::milliseconds(milliseconds as i64))
}

/// The protocol's epoch anchor: 1900-01-01T00:00:00Z.
fn protocol_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap()
}

/// Process-wide clock seeded from one synchronization.
///
/// A user-space process cannot portably set the system clock, so the synced
/// instant is captured together with a monotonic reference point and
/// `now()` extrapolates from there. Cheap to clone; the scheduler and the
/// request server share one.
#[derive(Debug, Clone)]
pub struct NodeClock {
    base: DateTime<Utc>,
    synced_at: Instant,
}

impl NodeClock {
    pub fn started_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            synced_at: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::milliseconds(self.synced_at.elapsed().as_millis() as i64)
    }
}
