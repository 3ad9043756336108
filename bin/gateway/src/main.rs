use anyhow::Result;
use gateway_core::{GatewayConfig, GatewayRegistry};
use gateway_proxy::{
    AuthGuard, FixedWindowLimiter, HealthCheckConfig, HealthMonitor, MetricsCollector,
    RequestForwarder,
};
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::init as tracing_init;

mod dispatcher;
mod responses;

use dispatcher::EdgeDispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    info!("Starting gateway...");

    let config = GatewayConfig::load()?;

    // Bootstrap the registry from static configuration
    let registry = Arc::new(GatewayRegistry::new());
    for service in &config.services {
        registry.register_service(service.clone()).await;
    }
    for route in &config.routes {
        registry.add_route(route.clone()).await;
    }
    info!(
        "Registry initialized with {} services and {} routes",
        registry.service_count().await,
        registry.route_count().await
    );

    let auth = match config.jwt_secret() {
        Some(secret) => Arc::new(AuthGuard::new(&secret)),
        None => {
            warn!("No JWT secret configured; routes requiring auth will reject all callers");
            warn!("Set GATEWAY_JWT_SECRET or jwt_secret in the config file");
            Arc::new(AuthGuard::disabled())
        }
    };

    let forwarder = Arc::new(RequestForwarder::new(Duration::from_secs(
        config.proxy_timeout_secs,
    )));
    info!("Request forwarder initialized with {}s timeout", config.proxy_timeout_secs);

    let limiter = Arc::new(FixedWindowLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_secs),
    ));
    info!(
        "Rate limiter initialized: {} requests per {}s window",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );

    let metrics = Arc::new(MetricsCollector::new()?);

    // Background health monitor, stopped on shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = Arc::new(HealthMonitor::new(
        registry.clone(),
        HealthCheckConfig {
            path: config.health_check.path.clone(),
            interval: Duration::from_secs(config.health_check.interval_secs),
            timeout: Duration::from_secs(config.health_check.timeout_secs),
        },
    )?);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx.clone()));

    // Periodic pruning of stale rate-limit windows
    let prune_limiter = limiter.clone();
    let mut prune_shutdown = shutdown_rx.clone();
    let prune_window = Duration::from_secs(config.rate_limit.window_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(prune_window);
        loop {
            tokio::select! {
                _ = ticker.tick() => prune_limiter.prune(),
                _ = prune_shutdown.changed() => break,
            }
        }
    });

    let dispatcher = Arc::new(EdgeDispatcher::new(
        registry,
        forwarder,
        auth,
        limiter.clone(),
        metrics,
        config.maintenance_restore_hint_secs,
    ));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway listening on {}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Error accepting connection: {}", e);
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let dispatcher = dispatcher.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req| {
                        let dispatcher = dispatcher.clone();
                        async move {
                            Ok::<_, hyper::Error>(dispatcher.dispatch(req, peer_addr.ip()).await)
                        }
                    });

                    if let Err(e) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Error serving connection from {}: {}", peer_addr, e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = monitor_handle.await;
    info!("Gateway stopped");

    Ok(())
}
