//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edge_proxy::config::{ProxyConfig, ProxyMode};
use edge_proxy::lifecycle::{Lifecycle, LifecycleState, Shutdown};
use edge_proxy::net::InFlightTracker;
use edge_proxy::HttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Read until the end of the request head (or EOF).
async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = [0u8; 4096];
    let mut head = Vec::new();
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&head).to_string()
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Backend that counts requests and answers `body` with 200.
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                respond(&mut socket, "200 OK", body).await;
            });
        }
    });
    (addr, hits)
}

/// Backend whose response body is the raw request head it received.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                respond(&mut socket, "200 OK", &head).await;
            });
        }
    });
    addr
}

/// Backend that waits `delay` before answering 200 "slow".
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                tokio::time::sleep(delay).await;
                respond(&mut socket, "200 OK", "slow").await;
            });
        }
    });
    addr
}

/// Backend that switches every request to `websocket` and then echoes
/// raw bytes back until the peer closes.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                let switch = "HTTP/1.1 101 Switching Protocols\r\n\
                              Connection: Upgrade\r\n\
                              Upgrade: websocket\r\n\r\n";
                if socket.write_all(switch.as_bytes()).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn reverse_config(upstream: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.mode = ProxyMode::Reverse;
    config.upstream.url = Some(upstream.to_string());
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

pub fn forward_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.mode = ProxyMode::Forward;
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub lifecycle: Arc<Lifecycle>,
    pub in_flight: InFlightTracker,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let server = HttpServer::new(config).unwrap();
    let lifecycle = server.lifecycle();
    let in_flight = server.in_flight();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::time::timeout(
        Duration::from_secs(5),
        lifecycle.reached(LifecycleState::Listening),
    )
    .await
    .unwrap();

    RunningProxy {
        addr,
        shutdown,
        lifecycle,
        in_flight,
        handle,
    }
}

/// Client with pooling disabled so every request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
