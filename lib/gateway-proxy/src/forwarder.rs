//! HTTP request forwarding to resolved backend services

use chrono::Utc;
use gateway_core::ServiceInfo;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::tokio::TokioExecutor;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

/// Header naming the service a request was dispatched to
pub const SERVICE_NAME_HEADER: &str = "x-service-name";
/// Header carrying the gateway's dispatch timestamp
pub const GATEWAY_TIMESTAMP_HEADER: &str = "x-gateway-timestamp";

/// Transport-level failure reaching a backend service
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    #[error("failed to read request or response body: {0}")]
    Body(Box<dyn std::error::Error + Send + Sync>),
}

/// Request forwarder with connection pooling and a hard upstream
/// timeout. Relays the upstream response byte-for-byte; transport
/// failures surface as typed errors for the dispatcher to map.
pub struct RequestForwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl RequestForwarder {
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        connector.set_keepalive(Some(Duration::from_secs(30)));

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(connector);

        Self { client, timeout }
    }

    /// Build the target address from the service coordinates plus the
    /// original path and query string
    pub fn target_url(service: &ServiceInfo, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => {
                format!("http://{}:{}{}?{}", service.host, service.port, path, q)
            }
            _ => format!("http://{}:{}{}", service.host, service.port, path),
        }
    }

    /// Forward a request to the given service and relay its response
    pub async fn forward<B>(
        &self,
        service: &ServiceInfo,
        request: Request<B>,
    ) -> Result<Response<Bytes>, ForwardError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let target = Self::target_url(service, &path, query.as_deref());

        debug!("Forwarding request to: {}", target);

        let uri: Uri = target
            .parse()
            .map_err(|_| ForwardError::InvalidTarget(target.clone()))?;

        let (mut parts, body) = request.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map_err(|e| ForwardError::Body(e.into()))?
            .to_bytes();

        // Drop hop-by-hop headers, keep everything else verbatim
        let mut headers = hyper::header::HeaderMap::new();
        for (k, v) in parts.headers.iter() {
            if !is_hop_by_hop_header(k.as_str()) {
                headers.insert(k.clone(), v.clone());
            }
        }
        headers.insert(
            HeaderName::from_static(SERVICE_NAME_HEADER),
            HeaderValue::from_str(&service.name)
                .map_err(|_| ForwardError::InvalidTarget(service.name.clone()))?,
        );
        headers.insert(
            HeaderName::from_static(GATEWAY_TIMESTAMP_HEADER),
            HeaderValue::from_str(&Utc::now().to_rfc3339())
                .map_err(|_| ForwardError::InvalidTarget("timestamp".to_string()))?,
        );
        parts.headers = headers;
        parts.uri = uri;

        let forwarded = Request::from_parts(parts, Full::new(body_bytes));

        match tokio_timeout(self.timeout, self.client.request(forwarded)).await {
            Ok(Ok(response)) => {
                debug!("Backend {} responded with {}", service.name, response.status());
                let (response_parts, body) = response.into_parts();
                let response_bytes = body
                    .collect()
                    .await
                    .map_err(|e| ForwardError::Body(Box::new(e)))?
                    .to_bytes();
                Ok(Response::from_parts(response_parts, response_bytes))
            }
            Ok(Err(e)) => {
                warn!("Backend {} transport error: {}", service.name, e);
                Err(ForwardError::Transport(e))
            }
            Err(_) => {
                warn!(
                    "Backend {} request timed out after {:?}",
                    service.name, self.timeout
                );
                Err(ForwardError::Timeout(self.timeout))
            }
        }
    }
}

/// Hop-by-hop headers are connection-scoped and must not be relayed
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::service::service_fn;
    use hyper_util::rt::tokio::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn service(host: &str, port: u16) -> ServiceInfo {
        ServiceInfo::new("cash-call-service", host, port)
    }

    /// Upstream that echoes the request headers it saw back as a
    /// response header-dump body
    async fn spawn_echo_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let io = TokioIo::new(stream);
                tokio::spawn(async move {
                    let svc = service_fn(|req: Request<hyper::body::Incoming>| async move {
                        let mut dump = String::new();
                        for (k, v) in req.headers() {
                            dump.push_str(&format!("{}={}\n", k, v.to_str().unwrap_or("")));
                        }
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(200)
                                .header("x-upstream", "yes")
                                .body(Full::new(Bytes::from(dump)))
                                .unwrap(),
                        )
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, svc)
                        .await;
                });
            }
        });

        addr
    }

    #[test]
    fn test_target_url() {
        let svc = service("10.0.0.5", 4001);
        assert_eq!(
            RequestForwarder::target_url(&svc, "/cash-calls/42", None),
            "http://10.0.0.5:4001/cash-calls/42"
        );
        assert_eq!(
            RequestForwarder::target_url(&svc, "/cash-calls", Some("status=open")),
            "http://10.0.0.5:4001/cash-calls?status=open"
        );
        assert_eq!(
            RequestForwarder::target_url(&svc, "/cash-calls", Some("")),
            "http://10.0.0.5:4001/cash-calls"
        );
    }

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop_header("connection"));
        assert!(is_hop_by_hop_header("Transfer-Encoding"));
        assert!(is_hop_by_hop_header("upgrade"));
        assert!(!is_hop_by_hop_header("content-type"));
        assert!(!is_hop_by_hop_header("authorization"));
    }

    #[tokio::test]
    async fn test_forward_relays_response_and_injects_headers() {
        let addr = spawn_echo_upstream().await;
        let svc = service("127.0.0.1", addr.port());
        let forwarder = RequestForwarder::new(Duration::from_secs(5));

        let req = Request::builder()
            .method("GET")
            .uri("/cash-calls/42")
            .header("x-request-id", "abc123")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = forwarder.forward(&svc, req).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("x-upstream").unwrap(), "yes");

        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("x-service-name=cash-call-service"));
        assert!(body.contains("x-gateway-timestamp="));
        assert!(body.contains("x-request-id=abc123"));
    }

    #[tokio::test]
    async fn test_forward_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let svc = service("127.0.0.1", port);
        let forwarder = RequestForwarder::new(Duration::from_secs(2));

        let req = Request::builder()
            .uri("/cash-calls")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = forwarder.forward(&svc, req).await.unwrap_err();
        assert!(matches!(err, ForwardError::Transport(_) | ForwardError::Timeout(_)));
    }
}
