//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use request_guard::config::{FilterConfig, GuardConfig};
use request_guard::{GuardServer, MemoryStore, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock upstream that answers every request with `200 OK` and `response`,
/// counting the requests it receives.
pub async fn start_mock_upstream(addr: SocketAddr, response: &'static str) -> Arc<AtomicUsize> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let _ = socket.read(&mut buf).await;
                        counter.fetch_add(1, Ordering::SeqCst);
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
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

    hits
}

/// Filter policy used by the integration tests.
pub fn filters(limit: u64) -> FilterConfig {
    FilterConfig {
        sql_keywords: vec!["select".into(), "DROP TABLE".into()],
        rate_limit_requests: limit,
        rate_limit_interval: Duration::from_secs(60),
    }
    .normalized()
}

/// Start the guard proxy in front of `upstream`. Returns the handle that stops it.
pub async fn start_guard(proxy: SocketAddr, upstream: SocketAddr, limit: u64) -> Shutdown {
    let mut config = GuardConfig::with_filters(filters(limit));
    config.listener.bind_address = proxy.to_string();
    config.upstream.address = upstream.to_string();

    let server = GuardServer::new(config, Arc::new(MemoryStore::new())).unwrap();
    let listener = TcpListener::bind(proxy).await.unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    shutdown
}

/// Client without connection pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
