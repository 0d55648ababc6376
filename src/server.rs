//! ==============================================================================
//! server.rs - single-connection TCP request server
//! ==============================================================================
//!
//! purpose:
//!     owns the listening socket and answers one bespoke text request per
//!     connection: accept, read what's there, parse the request line,
//!     dispatch on the command token, write the response, close.
//!
//! # Wire protocol
//!
//! **Request:** ASCII text, first line `<METHOD> /<command> <version>`.
//! The second whitespace-separated word, leading `/` stripped and
//! case-folded, selects the handler. Fewer than three words means an empty
//! command token.
//!
//! **Response:** `<status-line>\r\n<headers>\r\n\r\n<body>` with
//! Content-Type, Content-Length (exact body byte count, computed before any
//! byte is sent) and `Connection: close`. The status line is always
//! `HTTP/1.0 200 OK`; failures are reported only through body content. This
//! is deliberate protocol compatibility, not an oversight.
//!
//! known constraint:
//!     the request is taken from a single read. a request split across
//!     packets beyond that first read is not reassembled.
//!
//! relationships:
//!     - used by: main.rs (bind is fatal at startup; serve never returns)
//!     - uses: store.rs (`raw` streams the reading log), hal.rs (blink per
//!       handled request)
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::AcceptStrategy;
use crate::store::ReadingLog;
use crate::NodeContext;

const STATUS_LINE: &str = "HTTP/1.0 200 OK";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
const BAD_COMMAND_BODY: &[u8] = b"Bad command";

/// One parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// command token: second word, leading `/` stripped, lowercased.
    /// empty when the line has fewer than three words.
    pub command: String,
    pub raw_line: String,
}

impl Request {
    pub fn parse(text: &str) -> Self {
        let first_line = text.lines().next().unwrap_or("").to_string();
        let words: Vec<&str> = first_line.split_whitespace().collect();

        let command = if words.len() > 2 {
            words[1].trim_start_matches('/').to_ascii_lowercase()
        } else {
            String::new()
        };

        Self {
            method: words.first().unwrap_or(&"").to_string(),
            command,
            raw_line: first_line,
        }
    }
}

/// One framed response. Body is fully materialized so Content-Length is
/// exact before anything hits the wire; there is no chunked framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(body: Vec<u8>) -> Self {
        Self {
            content_type: CONTENT_TYPE_TEXT,
            body,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let header = format!(
            "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            STATUS_LINE,
            self.content_type,
            self.body.len()
        );
        let mut wire = header.into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }
}

/// The command table. Pure mapping from token to response; always 200.
///
/// | token   | behavior                                        |
/// |---------|-------------------------------------------------|
/// | `raw`   | full reading log contents (empty log => empty)  |
/// | `chart` | reserved extension point, empty body            |
/// | other   | fixed `Bad command` body                        |
pub async fn dispatch(command: &str, log: &ReadingLog) -> Response {
    match command {
        "raw" => {
            let body = match log.read_all().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    // inaccessible log degrades to an empty 200 body
                    tracing::warn!("[SERVER] log read failed: {}", e);
                    Vec::new()
                }
            };
            Response::text(body)
        }
        "chart" => Response::text(Vec::new()),
        _ => Response::text(BAD_COMMAND_BODY.to_vec()),
    }
}

/// Bind the listening socket. Failure here (port taken, no interface) is
/// fatal to startup; the caller propagates it and the process exits.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("[SERVER] Listening on port {}", port);
    Ok(listener)
}

/// Accept loop; never returns under normal operation.
///
/// `sequential` handles one connection fully before accepting the next,
/// matching the original device. `pooled` spawns a task per connection; the
/// wire contract is identical.
pub async fn serve(ctx: Arc<NodeContext>, listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("[SERVER] accept failed: {}", e);
                continue;
            }
        };
        tracing::debug!("[SERVER] connection from {}", peer);

        match ctx.config.server.strategy {
            AcceptStrategy::Sequential => handle_connection(&ctx, stream).await,
            AcceptStrategy::Pooled => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    handle_connection(&ctx, stream).await;
                });
            }
        }
    }
}

/// One connection: single read, parse, dispatch, respond, close.
async fn handle_connection(ctx: &NodeContext, mut stream: TcpStream) {
    let mut buffer = vec![0u8; 4096];
    let received = match stream.read(&mut buffer).await {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!("[SERVER] read failed: {}", e);
            return;
        }
    };

    // empty probe: close with no response
    if received == 0 {
        return;
    }

    let text = String::from_utf8_lossy(&buffer[..received]);
    let request = Request::parse(&text);
    tracing::debug!("[SERVER] {:?}", request.raw_line);

    let response = dispatch(&request.command, &ctx.log).await;
    if let Err(e) = stream.write_all(&response.into_bytes()).await {
        tracing::debug!("[SERVER] write failed: {}", e);
    }

    let indicator = ctx.indicator.clone();
    tokio::task::spawn_blocking(move || indicator.blink(1))
        .await
        .ok();
    // stream drops here: Connection: close, one request per connection
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_log(tag: &str) -> ReadingLog {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path: PathBuf = std::env::temp_dir().join(format!(
            "weather-node-server-{}-{}-{}.log",
            tag,
            std::process::id(),
            n
        ));
        ReadingLog::new(path)
    }

    #[test]
    fn parses_command_from_request_line() {
        let request = Request::parse("GET /raw HTTP/1.1\r\nHost: station\r\n\r\n");
        assert_eq!(request.method, "GET");
        assert_eq!(request.command, "raw");
        assert_eq!(request.raw_line, "GET /raw HTTP/1.1");
    }

    #[test]
    fn command_is_case_folded() {
        for line in ["GET /RAW HTTP/1.1", "GET /Raw HTTP/1.1", "GET /raw HTTP/1.1"] {
            assert_eq!(Request::parse(line).command, "raw");
        }
    }

    #[test]
    fn short_request_lines_yield_empty_command() {
        assert_eq!(Request::parse("GET /raw").command, "");
        assert_eq!(Request::parse("GET").command, "");
        assert_eq!(Request::parse("").command, "");
        assert_eq!(Request::parse("   \r\n").command, "");
    }

    #[tokio::test]
    async fn unknown_and_empty_commands_get_bad_command() {
        let log = scratch_log("bad");
        for token in ["", "bogus", "raw2", "charts"] {
            let response = dispatch(token, &log).await;
            assert_eq!(response.body, b"Bad command");
        }
    }

    #[tokio::test]
    async fn case_variants_dispatch_identically() {
        let log = scratch_log("case");
        log.append("x,1,2.00,3.00,4.00").await.unwrap();

        let canonical = dispatch("raw", &log).await;
        for line in ["GET /RAW HTTP/1.1", "GET /Raw HTTP/1.1"] {
            let request = Request::parse(line);
            let response = dispatch(&request.command, &log).await;
            assert_eq!(response, canonical);
        }

        tokio::fs::remove_file(log.path()).await.ok();
    }

    #[tokio::test]
    async fn raw_on_empty_log_is_zero_length_200() {
        let log = scratch_log("empty");
        let response = dispatch("raw", &log).await;
        assert!(response.body.is_empty());

        let wire = String::from_utf8(response.into_bytes()).unwrap();
        assert!(wire.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(wire.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn chart_is_a_stub_not_an_error() {
        let log = scratch_log("chart");
        let response = dispatch("chart", &log).await;
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn raw_twice_is_byte_identical() {
        let log = scratch_log("idempotent");
        log.append("2024-12-18 06:30:15,99875,29.50,20.00,68.00")
            .await
            .unwrap();

        let first = dispatch("raw", &log).await;
        let second = dispatch("raw", &log).await;
        assert_eq!(first.body, second.body);

        tokio::fs::remove_file(log.path()).await.ok();
    }

    #[tokio::test]
    async fn raw_final_line_matches_appended_record() {
        let log = scratch_log("roundtrip");
        log.append("2024-12-18 06:30:00,99870,29.49,19.98,67.96")
            .await
            .unwrap();
        log.append("2024-12-18 06:30:15,99875,29.50,20.00,68.00")
            .await
            .unwrap();

        let response = dispatch("raw", &log).await;
        let body = String::from_utf8(response.body).unwrap();
        assert_eq!(
            body.lines().last().unwrap(),
            "2024-12-18 06:30:15,99875,29.50,20.00,68.00"
        );

        tokio::fs::remove_file(log.path()).await.ok();
    }

    #[test]
    fn framing_has_exact_content_length_and_close() {
        let response = Response::text(b"Bad command".to_vec());
        let wire = String::from_utf8(response.into_bytes()).unwrap();

        let (head, body) = wire.split_once("\r\n\r\n").unwrap();
        assert_eq!(body, "Bad command");
        assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(head.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        assert!(head.contains("Connection: close"));
    }
}
