//! Health probing for registered backend services

use futures::future::join_all;
use gateway_core::{GatewayRegistry, HealthStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Health probe configuration
#[derive(Clone, Debug)]
pub struct HealthCheckConfig {
    /// HTTP path probed on each service
    pub path: String,
    /// Interval between probe rounds
    pub interval: Duration,
    /// Timeout for a single probe
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Periodically probes every registered service and writes the result
/// back into the registry. Probe failures never propagate.
pub struct HealthMonitor {
    registry: Arc<GatewayRegistry>,
    client: reqwest::Client,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        config: HealthCheckConfig,
    ) -> Result<Self, reqwest::Error> {
        // A client without the configured timeout would hang probes on
        // stalled upstreams, so a builder failure is fatal.
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            registry,
            client,
            config,
        })
    }

    /// Probe one service and record the result.
    ///
    /// A 2xx response means healthy; everything else, including
    /// transport errors, means unhealthy. The registry keeps the
    /// maintenance flag authoritative over whatever we record here.
    pub async fn check_service(&self, name: &str) -> bool {
        let service = match self.registry.get_service(name).await {
            Ok(service) => service,
            Err(_) => {
                warn!("Health check requested for unknown service: {}", name);
                return false;
            }
        };

        let url = format!("{}{}", service.base_url(), self.config.path);
        let healthy = match self.client.get(&url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    warn!("Service {} health probe returned {}", name, response.status());
                }
                ok
            }
            Err(e) => {
                warn!("Service {} health probe failed: {}", name, e);
                false
            }
        };

        let status = if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        self.registry.set_service_health(name, status).await;

        debug!("Service {} probed: {}", name, status);
        healthy
    }

    /// Probe every registered service concurrently. Services under
    /// maintenance are skipped; one failed probe never aborts the
    /// rest.
    pub async fn check_all(&self) {
        let services = self.registry.get_all_services().await;
        let probes = services
            .iter()
            .filter(|s| s.health != HealthStatus::Maintenance)
            .map(|s| self.check_service(&s.name));
        join_all(probes).await;
    }

    /// Background probe loop; runs until the shutdown channel fires
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Health monitor started (interval: {:?}, path: {})",
            self.config.interval, self.config.path
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        // First tick fires immediately; skip it so the bootstrap
        // health values stand until the first full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.changed() => {
                    info!("Health monitor stopping");
                    break;
                }
            }
        }
    }
}
