//! Shared utilities for integration tests: mock origins and a running proxy.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use forward_proxy::config::ProxyConfig;
use forward_proxy::net::{ConnectionTracker, Listener};
use forward_proxy::{ProxyServer, Shutdown};

/// A mock origin that records every request it receives.
pub struct RecordingOrigin {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<Vec<u8>>,
    pub hits: Arc<AtomicUsize>,
}

impl RecordingOrigin {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Next recorded request, failing the test after a few seconds.
    pub async fn next_request(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("origin received no request")
            .expect("origin stopped")
    }
}

/// Start an origin that reads one request per connection (head plus any
/// Content-Length body), records it, answers with `body` and closes.
pub async fn start_recording_origin(body: &'static str) -> RecordingOrigin {
    start_origin_with_delay(body, Duration::ZERO).await
}

/// Like [`start_recording_origin`], but waits `delay` before answering.
pub async fn start_origin_with_delay(body: &'static str, delay: Duration) -> RecordingOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let _ = tx.send(request);
                        tokio::time::sleep(delay).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
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

    RecordingOrigin {
        addr,
        requests: rx,
        hits,
    }
}

async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find(&data, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_string();
            if data.len() >= end + 4 + content_length(&head) {
                return data;
            }
        }
        let read = socket.read(&mut chunk).await.unwrap_or(0);
        if read == 0 {
            return data;
        }
        data.extend_from_slice(&chunk[..read]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// A proxy running on an ephemeral loopback port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
    pub task: JoinHandle<()>,
}

impl RunningProxy {
    /// Trigger shutdown and wait for the workers to drain.
    pub async fn stop(self) -> ConnectionTracker {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("proxy did not stop")
            .unwrap();
        self.tracker
    }
}

pub async fn start_proxy(mut config: ProxyConfig) -> RunningProxy {
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tracker = listener.tracker();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let task = tokio::spawn(ProxyServer::new(config).run(listener, server_shutdown));

    RunningProxy {
        addr,
        shutdown,
        tracker,
        task,
    }
}

/// Send `request` to the proxy and read until it closes the connection.
pub async fn send_raw(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request).await.unwrap();
    read_all(&mut stream).await
}

pub async fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    response
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
