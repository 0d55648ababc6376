//! end-to-end exercise of the request server over a live socket:
//! accept -> read -> parse -> dispatch -> respond -> close.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use weather_node::config::NodeConfig;
use weather_node::error::SensorError;
use weather_node::hal::{Barometer, BarometerSample, StatusIndicator};
use weather_node::store::ReadingLog;
use weather_node::timesync::NodeClock;
use weather_node::{server, NodeContext};

static COUNTER: AtomicU32 = AtomicU32::new(0);

struct FixedBarometer;

impl Barometer for FixedBarometer {
    fn read(&self) -> Result<BarometerSample, SensorError> {
        Ok(BarometerSample::from_pa_and_celsius(99_875.0, 20.0))
    }
}

struct SilentIndicator;

impl StatusIndicator for SilentIndicator {
    fn blink(&self, _count: u8) {}
}

/// Start a server on an ephemeral port; returns the context and the port.
async fn start_node() -> (Arc<NodeContext>, u16) {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let log_path = std::env::temp_dir().join(format!(
        "weather-node-e2e-{}-{}.log",
        std::process::id(),
        n
    ));

    let ctx = Arc::new(NodeContext {
        config: NodeConfig::default(),
        clock: NodeClock::started_at(Utc.with_ymd_and_hms(2024, 12, 18, 6, 30, 15).unwrap()),
        sensor: Arc::new(FixedBarometer),
        indicator: Arc::new(SilentIndicator),
        uploader: None,
        log: ReadingLog::new(log_path),
    });

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(server::serve(ctx.clone(), listener));

    (ctx, port)
}

/// One request/response exchange; the server closes after responding, so
/// read-to-end terminates.
async fn exchange(port: u16, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

#[tokio::test]
async fn raw_returns_the_full_log() {
    let (ctx, port) = start_node().await;
    ctx.log
        .append("2024-12-18 06:30:15,99875,29.50,20.00,68.00")
        .await
        .unwrap();

    let response = exchange(port, b"GET /raw HTTP/1.1\r\nHost: station\r\n\r\n").await;

    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(head.contains("Connection: close"));
    assert!(head.contains(&format!("Content-Length: {}", body.len())));
    assert_eq!(body, "2024-12-18 06:30:15,99875,29.50,20.00,68.00\n");

    tokio::fs::remove_file(ctx.log.path()).await.ok();
}

#[tokio::test]
async fn unknown_command_gets_bad_command_with_200() {
    let (_ctx, port) = start_node().await;

    let response = exchange(port, b"GET /reboot HTTP/1.1\r\n\r\n").await;

    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert_eq!(body, "Bad command");
}

#[tokio::test]
async fn short_request_line_gets_bad_command() {
    let (_ctx, port) = start_node().await;

    // two words only: command token is empty
    let response = exchange(port, b"GET /raw\r\n\r\n").await;
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    assert_eq!(body, "Bad command");
}

#[tokio::test]
async fn empty_probe_is_closed_without_response() {
    let (_ctx, port) = start_node().await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn sequential_loop_survives_many_connections() {
    let (ctx, port) = start_node().await;
    ctx.log.append("x,1,2.00,3.00,4.00").await.unwrap();

    let mut bodies = Vec::new();
    for _ in 0..5 {
        let response = exchange(port, b"GET /raw HTTP/1.1\r\n\r\n").await;
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        bodies.push(body.to_string());
    }

    // no intervening appends: every read is byte-identical
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));

    tokio::fs::remove_file(ctx.log.path()).await.ok();
}
