//! Target server helpers: reachability preflight and a local static server

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Wait for `url` to answer with a success status.
///
/// Connection errors are expected while a server is still starting and are
/// retried every 100ms until `timeout` elapses.
pub async fn probe_target(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let deadline = Instant::now() + timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Target answered {} after {} attempt(s)", resp.status(), attempts);
                return Ok(());
            }
            Ok(resp) => {
                warn!("Target returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(E2eError::TargetUnreachable {
                url: url.to_string(),
                attempts,
            });
        }
        sleep(Duration::from_millis(100)).await;
    }
}

/// Static file server running inside this process
pub struct StaticServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StaticServer {
    /// Serve `root` on `addr`; port 0 picks a free port.
    pub async fn start(root: &Path, addr: SocketAddr) -> E2eResult<Self> {
        if !root.is_dir() {
            return Err(E2eError::Server(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| E2eError::Server(format!("bind {}: {}", addr, e)))?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .fallback_service(ServeDir::new(root))
            .layer(TraceLayer::new_for_http());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!("Static server stopped with error: {}", e);
            }
        });

        info!("Serving {} on http://{}", root.display(), addr);

        Ok(Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// Bind address taken from a base URL such as `http://localhost:8000`
    pub fn addr_for(base_url: &str) -> E2eResult<SocketAddr> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| E2eError::Config(format!("base_url '{}': {}", base_url, e)))?;
        let host = match url.host_str() {
            Some("localhost") | None => "127.0.0.1",
            Some(h) => h.trim_start_matches('[').trim_end_matches(']'),
        };
        let port = url.port_or_known_default().unwrap_or(80);
        format!("{}:{}", host, port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{}]:{}", host, port).parse::<SocketAddr>())
            .map_err(|e| E2eError::Config(format!("cannot bind to {}:{}: {}", host, port, e)))
    }

    /// Base URL of the running server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Static server on {} stopped", self.addr);
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_for_maps_localhost_to_loopback() {
        let addr = StaticServer::addr_for("http://localhost:8000").unwrap();
        assert_eq!(addr, "127.0.0.1:8000".parse().unwrap());
    }

    #[test]
    fn addr_for_uses_scheme_default_port() {
        let addr = StaticServer::addr_for("http://127.0.0.1").unwrap();
        assert_eq!(addr.port(), 80);
    }

    #[test]
    fn addr_for_rejects_hostnames() {
        assert!(StaticServer::addr_for("http://example.com:8000").is_err());
    }

    #[tokio::test]
    async fn start_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = StaticServer::start(&missing, "127.0.0.1:0".parse().unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, E2eError::Server(_)));
    }

    #[tokio::test]
    async fn preflight_gives_up_on_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{}/", port);
        let err = probe_target(&url, Duration::from_millis(250)).await.unwrap_err();
        match err {
            E2eError::TargetUnreachable { attempts, .. } => assert!(attempts >= 1),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
