//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use switchyard::{HttpServer, RequestContext, Router, ServerConfig, Shutdown};

/// A running server bound to a random local port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ServerConfig>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve `router` on 127.0.0.1 with an OS-assigned port.
#[allow(dead_code)]
pub async fn start_server(router: Arc<Router>, config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(&config, router);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        config_tx,
    }
}

/// HTTP client that never reuses connections or goes through a proxy.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn request(method: Method, path: &str) -> RequestContext {
    RequestContext::new(method, path)
}

#[allow(dead_code)]
pub fn get_accepting(path: &str, accept: &'static str) -> RequestContext {
    RequestContext::new(Method::GET, path).with_accept(HeaderValue::from_static(accept))
}
