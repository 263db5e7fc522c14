//! Server management - serving the fake API and health checking it

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::booker::FakeBooker;
use crate::error::{E2eError, E2eResult};

/// Handle to a running fake API; shuts the server down when dropped
pub struct ServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    pub base_url: String,
    pub port: u16,
}

impl ServerHandle {
    /// Serve `booker` on a local port and wait until it answers `/ping`
    pub async fn spawn(booker: FakeBooker, config: ServerConfig) -> E2eResult<Self> {
        let addr = format!("{}:{}", config.host, config.port.unwrap_or(0));
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| E2eError::ServerStartup(format!("Failed to bind {}: {}", addr, e)))?;
        let port = listener.local_addr()?.port();
        let base_url = format!("http://{}:{}", config.host, port);

        info!("Spawning fake booking API on port {}", port);

        let (shutdown, signal) = oneshot::channel::<()>();
        let router = booker.router();
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = signal.await;
            });
            if let Err(e) = server.await {
                warn!("Fake booking API stopped: {}", e);
            }
        });

        let handle = ServerHandle {
            shutdown: Some(shutdown),
            base_url: base_url.clone(),
            port,
        };

        // Wait for server to be healthy
        handle.wait_for_healthy(config.startup_timeout).await?;

        info!("Server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}/ping", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(50)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop accepting connections
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            info!("Stopping fake booking API on port {}", self.port);
            let _ = shutdown.send(());
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Configuration for serving the fake API
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on (None = any free port)
    pub port: Option<u16>,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            startup_timeout: Duration::from_secs(10),
        }
    }
}
