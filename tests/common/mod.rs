//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reputation_gateway::config::{GatewayConfig, RetryConfig, SourceConfig};
use reputation_gateway::time::SystemClock;
use reputation_gateway::{HttpServer, ReputationService, Shutdown};

/// A canned upstream answer.
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl MockResponse {
    pub fn score(score: f64) -> Self {
        Self {
            status: 200,
            body: format!(r#"{{"risk_score": {}, "detail": {{"engine": "mock"}}}}"#, score),
            headers: Vec::new(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: "{}".into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable upstream. `f` receives the request line.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
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
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let request_line = request.lines().next().unwrap_or_default().to_string();

                        let response = f(request_line).await;
                        let mut extra = String::new();
                        for (name, value) in &response.headers {
                            extra.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
                            status_text(response.status),
                            response.body.len(),
                            extra,
                            response.body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A source definition pointing at a mock upstream.
pub fn source(name: &str, addr: SocketAddr) -> SourceConfig {
    SourceConfig {
        name: name.into(),
        endpoint: format!("http://{}/lookup", addr),
        api_key_env: None,
        enabled: true,
        retries: None,
    }
}

/// Defaults tuned for fast tests.
pub fn test_config(sources: Vec<SourceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.sources = sources;
    config.retries = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 20,
        backoff_factor: 2.0,
        max_delay_ms: 200,
        jitter_ratio: 0.0,
        attempt_timeout_ms: 2000,
    };
    config
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let service = Arc::new(ReputationService::from_config(&config, Arc::new(SystemClock)).unwrap());
    let server = HttpServer::new(&config, service);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
