//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create the Axum Router with the guard handler on every path
//! - Wire up middleware (tracing, request timeout)
//! - Drive the inspection pipeline for each request
//! - Forward allowed requests to the upstream

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{
        request::Parts,
        uri::{Authority, InvalidUri, PathAndQuery, Scheme},
        HeaderValue, Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::GuardConfig;
use crate::http::host::{append_forwarded_for, BufferedRequest};
use crate::pipeline::{Action, Inspector};
use crate::resilience::RetryPolicy;
use crate::store::SharedStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inspector: Inspector,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
    pub max_body_bytes: usize,
}

/// HTTP server for the guard proxy.
pub struct GuardServer {
    router: Router,
    config: Arc<GuardConfig>,
}

impl GuardServer {
    /// Create a new server around a shared counter store.
    pub fn new(config: GuardConfig, store: Arc<dyn SharedStore>) -> Result<Self, InvalidUri> {
        let upstream = Authority::from_str(&config.upstream.address)?;
        let inspector = Inspector::from_config(
            &config.filters,
            store,
            RetryPolicy::from(&config.store),
        );

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            inspector,
            client,
            upstream,
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(guard_handler))
            .route("/", any(guard_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.upstream.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the server until Ctrl+C or the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Inspect the request through the pipeline, then forward it or answer directly.
///
/// The peer address is appended to `x-forwarded-for` before inspection, so both the
/// filters and the upstream see it.
async fn guard_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();
    append_forwarded_for(&mut parts.headers, peer.ip());

    let host = BufferedRequest::from_parts(&parts);
    let pipeline = state.inspector.new_request();
    let request_id = pipeline.id();

    tracing::debug!(
        request_id = %request_id,
        peer = %peer,
        method = %parts.method,
        path = %parts.uri.path(),
        "Inspecting request"
    );

    // Header filters talk to the counter store synchronously and may back off
    // between attempts, so they run off the async workers.
    let (mut pipeline, mut host) = match tokio::task::spawn_blocking(move || {
        let mut pipeline = pipeline;
        let mut host = host;
        let action = pipeline.on_request_headers(&mut host);
        (pipeline, host, action)
    })
    .await
    {
        Ok((_, mut host, Action::Pause)) => return rejected(&mut host),
        Ok((pipeline, host, Action::Continue)) => (pipeline, host),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Header inspection task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "request inspection failed").into_response();
        }
    };

    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                // Client went away or sent a malformed body; the pipeline is dropped.
                tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
                return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
            }
        };
        if host.body_len() + chunk.len() > state.max_body_bytes {
            tracing::warn!(request_id = %request_id, limit = state.max_body_bytes, "Request body too large");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
        host.append(&chunk);

        let size = host.body_len();
        // Partial bodies are only buffered; inspection happens at end of stream.
        let action = pipeline.on_request_body(&mut host, size, false);
        debug_assert!(action == Action::Pause && !host.has_response());
    }

    let size = host.body_len();
    match pipeline.on_request_body(&mut host, size, true) {
        Action::Continue => forward(&state, parts, host.into_body(), request_id).await,
        Action::Pause => rejected(&mut host),
    }
}

fn rejected(host: &mut BufferedRequest) -> Response {
    host.take_response().unwrap_or_else(|| {
        (StatusCode::INTERNAL_SERVER_ERROR, "request held by inspection").into_response()
    })
}

/// Send the inspected request, with its extended `x-forwarded-for`, to the upstream.
async fn forward(state: &AppState, parts: Parts, body: Bytes, request_id: Uuid) -> Response {
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    let mut request = Request::from_parts(parts, Body::from(body));
    *request.uri_mut() = uri;
    *request.version_mut() = Version::HTTP_11;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        request.headers_mut().insert("x-request-id", value);
    }

    match state.client.request(request).await {
        Ok(response) => {
            tracing::debug!(request_id = %request_id, status = %response.status(), "Upstream responded");
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
