//! Request forwarding, health probing, and admission control

pub mod auth;
pub mod forwarder;
pub mod health;
pub mod metrics;
pub mod rate_limit;

pub use auth::{AuthGuard, AuthResult};
pub use forwarder::{ForwardError, RequestForwarder};
pub use health::{HealthCheckConfig, HealthMonitor};
pub use metrics::MetricsCollector;
pub use rate_limit::{FixedWindowLimiter, RateDecision, RateLimiter};
