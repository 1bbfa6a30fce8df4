//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use shortlink_gateway::config::{GatewayConfig, ServiceConfig};
use shortlink_gateway::lifecycle::{Gateway, Shutdown};
use shortlink_gateway::resilience::HttpTransport;
use shortlink_gateway::storage::{
    CacheStore, DurableStore, MemoryCache, MemoryStore, ShortUrlRecord, StorageError,
    CACHE_BACKEND, DURABLE_BACKEND,
};
use shortlink_gateway::HttpServer;

/// Read one request (headers and a `Content-Length` body) off the socket.
async fn drain_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let mut have = buf.len() - (end + 4);
            while have < length {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => have += n,
                }
            }
            return;
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
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
                        drain_request(&mut socket).await;
                        let (status, body) = f().await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
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

/// Backend that answers every request with `status`, counting calls.
pub async fn start_counting_backend(status: u16, body: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, body.to_string())
        }
    })
    .await;
    (addr, calls)
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config with fast retries, no background ticker and the given services.
pub fn test_config(services: Vec<ServiceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.services = services;
    config.retries.base_delay_ms = 20;
    config.retries.max_delay_ms = 200;
    config.health_check.enabled = false;
    config.health_check.timeout_secs = 2;
    config.observability.metrics_enabled = false;
    config
}

pub fn service(name: &str, addr: SocketAddr, retries: u32) -> ServiceConfig {
    let mut svc = ServiceConfig::new(name, &format!("http://{addr}"));
    svc.retries = retries;
    svc.timeout_ms = 1000;
    svc
}

/// Cache that can be switched into failing mode.
#[derive(Clone, Default)]
pub struct FlakyCache {
    pub inner: MemoryCache,
    pub failing: Arc<AtomicBool>,
}

impl FlakyCache {
    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("connection reset by peer".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

/// Durable store that can fail reads or visit increments independently.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub failing: Arc<AtomicBool>,
    pub failing_increments: Arc<AtomicBool>,
    pub increments: Arc<AtomicU32>,
}

impl FlakyStore {
    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn fail_increments(&self, on: bool) {
        self.failing_increments.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }

    pub async fn seed(&self, code: &str, target: &str) {
        let record = ShortUrlRecord::new(code, target, Duration::from_secs(3600)).unwrap();
        self.inner.insert(record).await.unwrap();
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    async fn get(&self, code: &str) -> Result<Option<ShortUrlRecord>, StorageError> {
        self.check()?;
        self.inner.get(code).await
    }

    async fn insert(&self, record: ShortUrlRecord) -> Result<(), StorageError> {
        self.check()?;
        self.inner.insert(record).await
    }

    async fn increment_visits(&self, code: &str) -> Result<(), StorageError> {
        self.check()?;
        if self.failing_increments.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("deadlock detected".into()));
        }
        self.increments.fetch_add(1, Ordering::SeqCst);
        self.inner.increment_visits(code).await
    }

    async fn delete(&self, code: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete(code).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

/// Build a gateway over flaky stores and probe the storage tiers once.
///
/// Services are left unprobed so mock backends only count forwarded calls.
pub async fn build_gateway(config: GatewayConfig, cache: &FlakyCache, store: &FlakyStore) -> Arc<Gateway> {
    let gateway = Arc::new(Gateway::build(
        config,
        Arc::new(cache.clone()),
        Arc::new(store.clone()),
        Arc::new(HttpTransport::new()),
    ));
    gateway.health().probe(CACHE_BACKEND).await;
    gateway.health().probe(DURABLE_BACKEND).await;
    gateway
}

/// Serve `gateway` on an ephemeral port. Keep the returned `Shutdown` alive.
pub async fn spawn_gateway(gateway: Arc<Gateway>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(gateway);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// HTTP client that never pools or follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Poll `check` until it holds or one second passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
