//! Core gateway data model and service registry
//!
//! This library provides:
//! - Service registry holding backend services and their health
//! - Route table with compiled path-pattern matching
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod registry;
pub mod route;
pub mod service;

pub use config::GatewayConfig;
pub use error::{CoreError, Result};
pub use registry::GatewayRegistry;
pub use route::{RouteMatch, RouteTable, ServiceRoute};
pub use service::{HealthStatus, Method, ServiceInfo};
