//! Edge dispatcher: the per-request gate pipeline
//!
//! Every inbound request runs a fixed sequence of gates, each of
//! which either halts with a terminal response or lets the request
//! progress. Built-in endpoints (gateway health, maintenance control,
//! metrics) are answered before any routing happens.

use crate::responses::json_response;
use chrono::Utc;
use gateway_core::{GatewayRegistry, HealthStatus, Method};
use gateway_proxy::{AuthGuard, MetricsCollector, RateLimiter, RequestForwarder};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Paths the gateway never routes: assets it does not serve
const BYPASS_PREFIXES: &[&str] = &["/static/", "/favicon.ico"];

pub struct EdgeDispatcher {
    registry: Arc<GatewayRegistry>,
    forwarder: Arc<RequestForwarder>,
    auth: Arc<AuthGuard>,
    limiter: Arc<dyn RateLimiter>,
    metrics: Arc<MetricsCollector>,
    restore_hint_secs: u64,
}

impl EdgeDispatcher {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        forwarder: Arc<RequestForwarder>,
        auth: Arc<AuthGuard>,
        limiter: Arc<dyn RateLimiter>,
        metrics: Arc<MetricsCollector>,
        restore_hint_secs: u64,
    ) -> Self {
        Self {
            registry,
            forwarder,
            auth,
            limiter,
            metrics,
            restore_hint_secs,
        }
    }

    /// Run a request through the gate pipeline and produce the final
    /// response. Never returns an error; every failure mode maps to a
    /// gateway-authored JSON response.
    pub async fn dispatch<B>(&self, req: Request<B>, client_ip: IpAddr) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        debug!("{} {} from {}", method, path, client_ip);
        self.metrics.record_request(&method, &path);

        let response = self.run_gates(req, client_ip).await;
        self.metrics.record_response(response.status().as_u16());
        response
    }

    async fn run_gates<B>(&self, req: Request<B>, client_ip: IpAddr) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();

        // Gate 1: bypass — gateway-internal paths and assets the
        // gateway does not serve
        if path == "/metrics" && req.method() == &hyper::Method::GET {
            let text = self
                .metrics
                .gather()
                .unwrap_or_else(|_| "# metrics unavailable\n".to_string());
            return Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(text)))
                .unwrap();
        }
        if BYPASS_PREFIXES.iter().any(|p| path.starts_with(p)) {
            return json_response(StatusCode::NOT_FOUND, &json!({"error": "Not found"}));
        }

        // Gate 2: gateway's own health endpoint
        if path == "/health" && req.method() == &hyper::Method::GET {
            let services = self.registry.get_all_services().await;
            return json_response(
                StatusCode::OK,
                &json!({
                    "status": "healthy",
                    "timestamp": Utc::now().to_rfc3339(),
                    "services": services,
                }),
            );
        }

        // Gate 3: maintenance control endpoint
        if path == "/maintenance" || path.starts_with("/maintenance/") {
            return self.handle_maintenance(req.method(), &path).await;
        }

        // Gate 4: route resolution; unknown HTTP methods never match
        let method = match req.method().as_str().parse::<Method>() {
            Ok(m) => m,
            Err(()) => {
                return json_response(StatusCode::NOT_FOUND, &json!({"error": "Route not found"}));
            }
        };
        let matched = match self.registry.find_route(&path, method).await {
            Some(m) => m,
            None => {
                debug!("No route for {} {}", method, path);
                return json_response(StatusCode::NOT_FOUND, &json!({"error": "Route not found"}));
            }
        };
        let route = &matched.route;

        // Gate 5: the route's service must exist
        let service = match self.registry.get_service(&route.service).await {
            Ok(s) => s,
            Err(_) => {
                warn!("Route {} references unregistered service {}", route.path, route.service);
                return json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({"error": "Service not available", "service": route.service}),
                );
            }
        };

        // Gate 6: operator maintenance flag outranks probed health
        if self.registry.is_in_maintenance(&service.name).await {
            let restore = Utc::now() + chrono::Duration::seconds(self.restore_hint_secs as i64);
            return json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({
                    "error": "Service temporarily unavailable",
                    "service": service.name,
                    "maintenance": true,
                    "estimatedRestore": restore.to_rfc3339(),
                }),
            );
        }

        // Gate 7: probed health
        if service.health != HealthStatus::Healthy {
            return json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({
                    "error": "Service unhealthy",
                    "service": service.name,
                    "health": service.health,
                }),
            );
        }

        // Gate 8: authentication and role enforcement
        if route.requires_auth {
            let authorization = req
                .headers()
                .get(hyper::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            let auth = self.auth.authenticate(authorization);

            if !auth.authenticated {
                return json_response(
                    StatusCode::UNAUTHORIZED,
                    &json!({"error": "Authentication required"}),
                );
            }

            if let Some(roles) = &route.roles {
                let permitted = auth
                    .role
                    .as_ref()
                    .map(|r| roles.iter().any(|allowed| allowed == r))
                    .unwrap_or(false);
                if !permitted {
                    return json_response(
                        StatusCode::FORBIDDEN,
                        &json!({"error": "Insufficient permissions"}),
                    );
                }
            }
        }

        // Gate 9: per-client admission
        let decision = self.limiter.check(&client_ip.to_string()).await;
        if !decision.allowed {
            return json_response(
                StatusCode::TOO_MANY_REQUESTS,
                &json!({"error": "Rate limit exceeded"}),
            );
        }

        // Gate 10: proxy to the resolved backend
        let started = Instant::now();
        match self.forwarder.forward(&service, req).await {
            Ok(response) => {
                self.metrics
                    .record_upstream_latency(&service.name, started.elapsed().as_secs_f64());
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Full::new(body))
            }
            Err(e) => {
                // The transport cause stays in the logs; the caller
                // gets a generic message.
                warn!("Proxy to {} failed: {}", service.name, e);
                self.metrics.record_upstream_error();
                json_response(
                    StatusCode::BAD_GATEWAY,
                    &json!({
                        "error": "Bad gateway",
                        "service": service.name,
                        "message": "Unable to reach service",
                    }),
                )
            }
        }
    }

    /// `POST /maintenance/{service}/{enable|disable}`
    async fn handle_maintenance(
        &self,
        method: &hyper::Method,
        path: &str,
    ) -> Response<Full<Bytes>> {
        if method != &hyper::Method::POST {
            return json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &json!({"error": "Method not allowed"}),
            );
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() != 3 {
            return json_response(
                StatusCode::BAD_REQUEST,
                &json!({"error": "Malformed maintenance path"}),
            );
        }
        let (service_name, action) = (segments[1], segments[2]);

        let result = match action {
            "enable" => self.registry.enable_maintenance(service_name).await,
            "disable" => self.registry.disable_maintenance(service_name).await,
            _ => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({"error": "Unknown action", "action": action}),
                );
            }
        };

        match result {
            Ok(service) => {
                let verb = if action == "enable" { "enabled" } else { "disabled" };
                json_response(
                    StatusCode::OK,
                    &json!({
                        "message": format!("Maintenance mode {} for {}", verb, service.name),
                        "service": service.name,
                        "status": service.health,
                    }),
                )
            }
            Err(_) => json_response(
                StatusCode::NOT_FOUND,
                &json!({"error": "Service not found", "service": service_name}),
            ),
        }
    }
}
