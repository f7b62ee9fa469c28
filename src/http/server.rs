//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: `/health`, `/ready`, everything else proxied
//! - Wire up middleware (tracing, request ID, CORS headers, compression,
//!   panic recovery)
//! - Run the admission pipeline: gates → target resolution → forwarder
//! - Drive the Listening → Draining → Stopped transitions
//! - Emit one access record per proxied request

use std::any::Any;
use std::future::IntoFuture;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::health::{health_handler, ready_handler, HEALTH_PATH, READY_PATH};
use crate::http::forwarder::Forwarder;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::{error_response, ProxyError, ProxyOutcome};
use crate::lifecycle::shutdown;
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::net::InFlightTracker;
use crate::observability::metrics;
use crate::routing::Target;
use crate::security::cors::CorsPolicy;
use crate::security::{GateChain, InboundRequest, Verdict};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub gates: Arc<GateChain>,
    pub target: Arc<Target>,
    pub forwarder: Arc<Forwarder>,
    pub lifecycle: Arc<Lifecycle>,
    pub in_flight: InFlightTracker,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to initialise upstream TLS: {0}")]
    Tls(#[from] rustls::Error),
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build the server from an already validated configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let state = AppState {
            gates: Arc::new(GateChain::from_config(&config)),
            target: Arc::new(Target::from_config(&config)),
            forwarder: Arc::new(Forwarder::new(config.timeouts.forward())?),
            lifecycle: Arc::new(Lifecycle::new()),
            in_flight: InFlightTracker::new(),
            config: Arc::new(config),
        };

        let router = Self::build_router(&state);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: &AppState) -> Router {
        let mut router = Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .route(READY_PATH, get(ready_handler))
            .fallback(proxy_handler)
            .with_state(state.clone())
            .layer(CatchPanicLayer::custom(panic_response));

        if state.config.compression {
            router = router.layer(CompressionLayer::new());
        }
        for (name, value) in CorsPolicy::from_config(&state.config.security).response_headers() {
            router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
        }

        router
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Router with all layers, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.state.lifecycle)
    }

    pub fn in_flight(&self) -> InFlightTracker {
        self.state.in_flight.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    ///
    /// On shutdown the listener is closed at once; requests already in the
    /// pipeline get up to the drain timeout to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let HttpServer { router, state } = self;
        let lifecycle = Arc::clone(&state.lifecycle);
        let in_flight = state.in_flight.clone();
        let drain_timeout = state.config.timeouts.drain();

        if let Err(e) = lifecycle.transition(LifecycleState::Listening) {
            tracing::warn!(error = %e, "Server started outside the Starting state");
        }
        tracing::info!(
            address = %addr,
            port = addr.port(),
            mode = %state.config.mode,
            target = %state.target.describe(),
            gates = ?state.gates.gate_names(),
            "Proxy listening"
        );

        let signal = {
            let lifecycle = Arc::clone(&lifecycle);
            let in_flight = in_flight.clone();
            async move {
                shutdown::wait(shutdown).await;
                if lifecycle.transition(LifecycleState::Draining).is_ok() {
                    tracing::info!(
                        in_flight = in_flight.active(),
                        drain_timeout_ms = drain_timeout.as_millis() as u64,
                        "Draining: listener closed, waiting for in-flight requests"
                    );
                }
            }
        };

        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .into_future();

        let deadline = async {
            lifecycle.reached(LifecycleState::Draining).await;
            tokio::time::sleep(drain_timeout).await;
        };

        let result = tokio::select! {
            result = serve => result,
            _ = deadline => {
                tracing::warn!(
                    in_flight = in_flight.active(),
                    "Drain deadline exceeded; abandoning remaining requests"
                );
                Ok(())
            }
        };

        if let Err(e) = lifecycle.transition(LifecycleState::Stopped) {
            tracing::debug!(error = %e, "Lifecycle already stopped");
        }
        tracing::info!(uptime_secs = lifecycle.uptime().as_secs(), "Proxy stopped");
        result
    }
}

/// Every path other than the health endpoints.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let _in_flight = state.in_flight.track();
    metrics::set_in_flight(state.in_flight.active());

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).to_string();

    let mut inbound =
        InboundRequest::new(request, peer, state.config.security.trust_proxy_headers);
    let client_ip = inbound.client_ip;

    let (response, outcome) = match state.gates.run(&mut inbound).await {
        Verdict::Reject(rejection) => (rejection.into_response(), ProxyOutcome::Rejected),
        Verdict::Admit => match forward(&state, inbound).await {
            Ok(response) => (response, ProxyOutcome::Forwarded),
            Err(error) => {
                match &error {
                    ProxyError::Route(e) => tracing::warn!(
                        request_id = %request_id,
                        client_ip = %client_ip,
                        error = %e,
                        "Target resolution failed"
                    ),
                    other => {
                        tracing::error!(
                            request_id = %request_id,
                            client_ip = %client_ip,
                            kind = other.kind(),
                            error = %other,
                            "Forwarding failed"
                        );
                        metrics::record_forward_failure(other.kind());
                    }
                }
                (error.into_response(), ProxyOutcome::Failed)
            }
        },
    };

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), outcome.as_str(), started);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        outcome = outcome.as_str(),
        client_ip = %client_ip,
        latency_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

async fn forward(state: &AppState, inbound: InboundRequest) -> Result<Response, ProxyError> {
    let target = state.target.resolve(&inbound.parts.uri)?;
    state.forwarder.forward(inbound, target).await
}

/// Last-resort handler: a panic anywhere below becomes a 500 JSON response.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(error = %message, "Unhandled internal error");
    error_response(
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        &ProxyError::Internal(message.to_string()).public_message(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyMode;
    use crate::health::{HealthReport, ReadyReport};
    use crate::http::request::X_REQUEST_ID;
    use crate::http::response::ErrorBody;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    fn forward_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.mode = ProxyMode::Forward;
        config
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_mode_and_bypasses_gates() {
        let mut config = forward_config();
        config.security.api_key = Some("secret".into());
        let server = HttpServer::new(config).unwrap();

        let response = server.router().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let report: HealthReport = json(response).await;
        assert_eq!(report.status, "ok");
        assert_eq!(report.mode, "forward");
        assert_eq!(report.state, "starting");
        assert_eq!(report.in_flight, 0);
    }

    #[tokio::test]
    async fn ready_follows_lifecycle() {
        let server = HttpServer::new(forward_config()).unwrap();

        let response = server.router().oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!json::<ReadyReport>(response).await.ready);

        server.lifecycle().transition(LifecycleState::Listening).unwrap();
        let response = server.router().oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json::<ReadyReport>(response).await.ready);

        server.lifecycle().transition(LifecycleState::Draining).unwrap();
        let response = server.router().oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_target_is_400_json_with_cors_headers() {
        let server = HttpServer::new(forward_config()).unwrap();

        let response = server.router().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let body: ErrorBody = json(response).await;
        assert!(body.error.contains("url"));
    }

    #[tokio::test]
    async fn preflight_is_answered_locally() {
        let mut config = forward_config();
        config.security.allowed_origin = "https://app.example".into();
        let server = HttpServer::new(config).unwrap();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/?url=http://127.0.0.1:9/x")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let server = HttpServer::new(forward_config()).unwrap();
        let request = Request::builder()
            .uri("/health")
            .header(X_REQUEST_ID, "trace-me")
            .body(Body::empty())
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "trace-me");
    }

    #[tokio::test]
    async fn shutdown_moves_to_stopped() {
        let server = HttpServer::new(forward_config()).unwrap();
        let lifecycle = server.lifecycle();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let coordinator = shutdown::Shutdown::new();
        let handle = tokio::spawn(server.run(listener, coordinator.subscribe()));

        lifecycle.reached(LifecycleState::Listening).await;
        coordinator.trigger();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }
}
