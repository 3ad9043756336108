//! Service registry for managing backend services and routes

use crate::route::{RouteMatch, RouteTable, ServiceRoute};
use crate::service::{HealthStatus, Method, ServiceInfo};
use crate::{CoreError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

// Services, maintenance membership and routes live under one lock so
// readers never observe a health flag without its matching membership.
struct RegistryState {
    services: HashMap<String, ServiceInfo>,
    maintenance: HashSet<String>,
    routes: RouteTable,
}

/// GatewayRegistry holds the authoritative set of services and routes
pub struct GatewayRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                services: HashMap::new(),
                maintenance: HashSet::new(),
                routes: RouteTable::new(),
            })),
        }
    }

    /// Register or replace a service, keyed by name
    pub async fn register_service(&self, info: ServiceInfo) {
        let mut state = self.state.write().await;
        debug!("Registered service: {}", info.name);
        state.services.insert(info.name.clone(), info);
    }

    /// Append a route in registration order.
    ///
    /// The target service is deliberately not validated here; a
    /// dangling reference surfaces at request time as 503.
    pub async fn add_route(&self, route: ServiceRoute) {
        let mut state = self.state.write().await;
        debug!("Registered route: {} {} -> {}", route.method, route.path, route.service);
        state.routes.add(route);
    }

    /// First-match route lookup
    pub async fn find_route(&self, path: &str, method: Method) -> Option<RouteMatch> {
        let state = self.state.read().await;
        state.routes.find(path, method)
    }

    pub async fn get_service(&self, name: &str) -> Result<ServiceInfo> {
        let state = self.state.read().await;
        state
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))
    }

    /// Snapshot of all registered services, ordered by name
    pub async fn get_all_services(&self) -> Vec<ServiceInfo> {
        let state = self.state.read().await;
        let mut services: Vec<ServiceInfo> = state.services.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    /// Update a service's health and check timestamp together.
    ///
    /// No-op for unknown names and for services under maintenance,
    /// where the operator's flag outranks probe results.
    pub async fn set_service_health(&self, name: &str, health: HealthStatus) {
        let mut state = self.state.write().await;
        if state.maintenance.contains(name) {
            debug!("Ignoring health update for {} (in maintenance)", name);
            return;
        }
        if let Some(service) = state.services.get_mut(name) {
            service.health = health;
            service.last_check = Some(Utc::now());
            debug!("Service {} health set to {}", name, health);
        }
    }

    /// Put a service into maintenance mode; idempotent
    pub async fn enable_maintenance(&self, name: &str) -> Result<ServiceInfo> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match state.services.get_mut(name) {
            Some(service) => {
                state.maintenance.insert(name.to_string());
                service.health = HealthStatus::Maintenance;
                service.last_check = Some(Utc::now());
                debug!("Maintenance mode enabled for {}", name);
                Ok(service.clone())
            }
            None => Err(CoreError::ServiceNotFound(name.to_string())),
        }
    }

    /// Take a service out of maintenance mode; idempotent
    pub async fn disable_maintenance(&self, name: &str) -> Result<ServiceInfo> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match state.services.get_mut(name) {
            Some(service) => {
                state.maintenance.remove(name);
                service.health = HealthStatus::Healthy;
                service.last_check = Some(Utc::now());
                debug!("Maintenance mode disabled for {}", name);
                Ok(service.clone())
            }
            None => Err(CoreError::ServiceNotFound(name.to_string())),
        }
    }

    pub async fn is_in_maintenance(&self, name: &str) -> bool {
        let state = self.state.read().await;
        state.maintenance.contains(name)
    }

    pub async fn service_count(&self) -> usize {
        let state = self.state.read().await;
        state.services.len()
    }

    pub async fn route_count(&self) -> usize {
        let state = self.state.read().await;
        state.routes.len()
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
