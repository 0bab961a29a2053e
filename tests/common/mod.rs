//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use resilient_poller::config::{PeerServiceConfig, RetryConfig, WeatherConfig};

/// The parts of a request a mock handler routes on.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

/// Start a programmable mock backend on an ephemeral port.
///
/// Every request is answered with the `(status, body)` returned by `f`,
/// then the connection is closed.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A backend that counts requests and delegates to `f`.
pub async fn start_counting_backend<F>(f: F) -> (SocketAddr, Arc<AtomicU32>)
where
    F: Fn(u32, &MockRequest) -> (u16, String) + Send + Sync + 'static,
{
    let count = Arc::new(AtomicU32::new(0));
    let counter = count.clone();
    let f = Arc::new(f);
    let addr = start_programmable_backend(move |req| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let reply = f(n, &req);
        async move { reply }
    })
    .await;
    (addr, count)
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut parts = head.lines().next()?.split_whitespace();
    Some(MockRequest {
        method: parts.next()?.to_string(),
        target: parts.next()?.to_string(),
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    })
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        422 => "422 Unprocessable Entity",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Short delays so retries finish quickly in real time.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay_ms: 10,
        max_delay_ms: 50,
        backoff_factor: 2.0,
        jitter: false,
    }
}

pub fn peer_config(addr: SocketAddr) -> PeerServiceConfig {
    let mut config = PeerServiceConfig::default();
    config.base_url = format!("http://{}", addr);
    config.timeout_secs = 2;
    config.retry = fast_retry(3);
    config
}

pub fn weather_config(addr: SocketAddr) -> WeatherConfig {
    let mut config = WeatherConfig::default();
    config.base_url = format!("http://{}", addr);
    config.timeout_secs = 2;
    config.retry = fast_retry(2);
    config
}

pub const USERS_JSON: &str = r#"[
    {"id": 1, "name": "John Doe", "email": "john@example.com"},
    {"id": 2, "name": "Jane Smith", "email": "jane@example.com", "createdAt": "2024-01-01T00:00:00Z"}
]"#;

/// Poll `cond` every 10ms until it holds or `limit` elapses.
pub async fn wait_until<F: Fn() -> bool>(cond: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
