//! HTTP request execution and collector control signals


use crate::{
    error::{AppError, Result},
    models::metrics::RequestOutcome,
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use std::time::{Duration, Instant};

/// Issues one benchmark request and classifies its outcome
///
/// Implementations never retry and never return an error: every failure is folded
/// into an outcome with `success == false` and the elapsed time.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self) -> RequestOutcome;
}

/// Connection pool settings shared by all workers of one trial
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept per host
    pub max_idle_per_host: usize,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// How long idle pooled connections stay open
    pub pool_idle_timeout: Option<Duration>,
    /// TCP keep-alive settings
    pub tcp_keep_alive: Option<Duration>,
}

impl PoolConfig {
    /// Pool able to hold one warm connection per worker
    pub fn for_concurrency(concurrency: usize) -> Self {
        Self {
            max_idle_per_host: concurrency.max(1),
            request_timeout: crate::defaults::REQUEST_TIMEOUT,
            connect_timeout: crate::defaults::REQUEST_TIMEOUT,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            tcp_keep_alive: Some(Duration::from_secs(60)),
        }
    }

    /// Build a reqwest client with these settings
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(concat!("http-client-bench/", env!("CARGO_PKG_VERSION")));

        if let Some(keep_alive) = self.tcp_keep_alive {
            builder = builder.tcp_keepalive(keep_alive);
        }

        builder
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }
}

/// POSTs the fixed JSON payload to the benchmark endpoint over a pooled client
///
/// The client lives as long as the executor, so warmup and measured runs that
/// share an executor reuse the same warm connections.
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
    client: Client,
    url: Url,
}

impl HttpRequestExecutor {
    /// Create an executor with an explicit pool configuration
    pub fn new(url: &str, pool_config: &PoolConfig) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| AppError::config(format!("Invalid server URL '{}': {}", url, e)))?;
        Ok(Self {
            client: pool_config.build_client()?,
            url,
        })
    }

    /// Create an executor whose pool is sized for `concurrency` workers
    pub fn for_concurrency(url: &str, concurrency: usize) -> Result<Self> {
        Self::new(url, &PoolConfig::for_concurrency(concurrency))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RequestExecutor for HttpRequestExecutor {
    async fn execute(&self) -> RequestOutcome {
        let request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(crate::defaults::REQUEST_BODY);

        let start = Instant::now();
        let success = match request.send().await {
            // Drain the body so the connection goes back to the pool
            Ok(response) => {
                let status = response.status();
                response.bytes().await.is_ok() && status.is_success()
            }
            Err(_) => false,
        };
        let latency = start.elapsed();

        if success {
            RequestOutcome::success(latency)
        } else {
            RequestOutcome::failure(latency)
        }
    }
}

/// Start/stop notifications to the external metrics collector
#[async_trait]
pub trait CollectorSignal: Send + Sync {
    async fn start_collection(&self) -> Result<()>;
    async fn stop_collection(&self) -> Result<()>;
}

/// Collector control over HTTP: `POST {base}/control/start-collection` and `/stop-collection`
#[derive(Debug, Clone)]
pub struct ControlChannel {
    client: Client,
    base_url: String,
}

impl ControlChannel {
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| AppError::config(format!("Invalid control URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(crate::defaults::CONTROL_TIMEOUT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create control client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, action: &str) -> String {
        format!("{}/control/{}", self.base_url, action)
    }

    async fn post(&self, action: &str) -> Result<()> {
        let url = self.endpoint(action);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::http_request(format!("{} returned {}", url, status)))
        }
    }
}

#[async_trait]
impl CollectorSignal for ControlChannel {
    async fn start_collection(&self) -> Result<()> {
        self.post("start-collection").await
    }

    async fn stop_collection(&self) -> Result<()> {
        self.post("stop-collection").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sized_for_concurrency() {
        assert_eq!(PoolConfig::for_concurrency(512).max_idle_per_host, 512);
        assert_eq!(PoolConfig::for_concurrency(0).max_idle_per_host, 1);
        assert_eq!(
            PoolConfig::for_concurrency(8).request_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_executor_rejects_invalid_url() {
        assert!(HttpRequestExecutor::for_concurrency("not a url", 4).is_err());
    }

    #[test]
    fn test_control_endpoints() {
        let channel = ControlChannel::new("http://server:8080/").unwrap();
        assert_eq!(
            channel.endpoint("start-collection"),
            "http://server:8080/control/start-collection"
        );
        assert_eq!(
            channel.endpoint("stop-collection"),
            "http://server:8080/control/stop-collection"
        );
    }
}
