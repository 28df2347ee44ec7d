//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the health route and the relay dispatcher
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Resolve each request to a relay target against the live config
//! - Apply config hot reloads and graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, State},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::RelayError;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::relay::{self, CredentialResolver, Inbound, SessionContext, UpstreamClient};
use crate::routing::Target;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<RelayConfig>>,
    pub upstream: UpstreamClient,
    pub credentials: CredentialResolver,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<ArcSwap<RelayConfig>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config.timeouts, &config.relay)?;
        let credentials = CredentialResolver::new(upstream.raw().clone());
        let shared = Arc::new(ArcSwap::from_pointee(config));

        let state = AppState {
            config: shared.clone(),
            upstream,
            credentials,
        };

        let router = Self::build_router(&shared.load(), state);
        Ok(Self {
            router,
            config: shared,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .fallback(relay_handler)
            .with_state(state)
            // `listener.max_body_size` is the only body cap.
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let live = self.config.clone();
        tokio::spawn(async move {
            while let Some(update) = config_updates.recv().await {
                tracing::info!(upstream = %update.relay.upstream, "Configuration reloaded");
                live.store(Arc::new(update));
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<RelayConfig> {
        self.config.load_full()
    }
}

#[derive(Serialize)]
struct HealthStatus {
    version: &'static str,
    status: &'static str,
    upstream: String,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        upstream: state.config.load().relay.upstream_origin().to_string(),
    })
}

/// Main relay handler.
/// Resolves the target mount and forwards the request.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let config = state.config.load_full();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(target) = Target::resolve(&config.relay, &path) else {
        tracing::debug!(request_id = %request_id, path = %path, "No relay mount matched");
        metrics::record_request(method.as_str(), 404, "none", start_time);
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let kind = target.kind();

    if matches!(target, Target::App { .. })
        && !matches!(method, Method::GET | Method::HEAD | Method::POST)
    {
        metrics::record_request(method.as_str(), 405, kind, start_time);
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let result = forward(&state, &config, &target, request).await;
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %e, "Relay failed");
            e.into_response()
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        target = kind,
        status = response.status().as_u16(),
        "Relayed request"
    );
    metrics::record_request(method.as_str(), response.status().as_u16(), kind, start_time);
    response
}

async fn forward(
    state: &AppState,
    config: &RelayConfig,
    target: &Target<'_>,
    request: Request<Body>,
) -> Result<Response, RelayError> {
    let method = request.method().clone();
    let headers = request.headers().clone();
    let query = request.uri().query().map(str::to_string);
    let body = if matches!(method, Method::GET | Method::HEAD) {
        None
    } else {
        Some(Bytes::from_request(request, &()).await?)
    };
    let inbound = Inbound {
        method,
        headers,
        query,
        body,
    };

    match target {
        Target::App { tail } => {
            let ctx = SessionContext::derive(&config.relay.prefix, tail);
            relay::relay_app(config, &state.upstream, &state.credentials, &ctx, inbound).await
        }
        Target::Static { tail } => {
            // Same upstream as the app: redirects and cookies belong under the app prefix.
            let ctx = SessionContext::passthrough(&config.relay.prefix, tail);
            relay::relay_passthrough(
                config,
                &state.upstream,
                config.relay.upstream_origin(),
                &[],
                &ctx,
                inbound,
            )
            .await
        }
        Target::Host { host, tail } => {
            let ctx = SessionContext::passthrough(&host.mount, tail);
            relay::relay_passthrough(
                config,
                &state.upstream,
                &host.origin,
                &host.forward_headers,
                &ctx,
                inbound,
            )
            .await
        }
    }
}
