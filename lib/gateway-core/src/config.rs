//! Bootstrap configuration loaded at process start
//!
//! A YAML file declares the listen address, probe cadence, limits,
//! and the static service/route tables. The file path comes from
//! `GATEWAY_CONFIG` (default `gateway.yaml`); the JWT secret may be
//! supplied or overridden via `GATEWAY_JWT_SECRET`.

use crate::route::ServiceRoute;
use crate::service::ServiceInfo;
use crate::Result;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub health_check: HealthCheckSettings,
    #[serde(default = "default_proxy_timeout")]
    pub proxy_timeout_secs: u64,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default = "default_restore_hint")]
    pub maintenance_restore_hint_secs: u64,
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    pub services: Vec<ServiceInfo>,
    #[serde(default)]
    pub routes: Vec<ServiceRoute>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HealthCheckSettings {
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_check_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval_secs: default_check_interval(),
            timeout_secs: default_check_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_max")]
    pub max_requests: u32,
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_rate_max(),
            window_secs: default_rate_window(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_restore_hint() -> u64 {
    1800
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_check_interval() -> u64 {
    30
}

fn default_check_timeout() -> u64 {
    5
}

fn default_rate_max() -> u32 {
    100
}

fn default_rate_window() -> u64 {
    60
}

impl GatewayConfig {
    /// Load from the path in `GATEWAY_CONFIG`, default `gateway.yaml`
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "gateway.yaml".to_string());
        Self::from_path(&path)
    }

    pub fn from_path(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatewayConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Token verification secret; the environment wins over the file
    pub fn jwt_secret(&self) -> Option<String> {
        std::env::var("GATEWAY_JWT_SECRET")
            .ok()
            .or_else(|| self.jwt_secret.clone())
    }
}
