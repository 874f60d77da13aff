//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the mint, transfer and health handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - Serve on a listener until the shutdown token fires, then drain

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::{ListenerConfig, ServiceConfig};
use crate::http::handlers;
use crate::ledger::{GatewayFactory, LedgerResult};
use crate::lifecycle::Shutdown;
use crate::service::{TokenService, WalletSessions};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TokenService>,
    pub sessions: WalletSessions,
    pub shutdown: Shutdown,
    /// After this, mint and transfer stop starting provider attempts.
    pub request_deadline: Duration,
}

/// HTTP front end of the minting service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    shutdown: Shutdown,
}

impl HttpServer {
    pub fn new(
        config: ServiceConfig,
        factory: Arc<dyn GatewayFactory>,
        shutdown: Shutdown,
    ) -> LedgerResult<Self> {
        let state = AppState {
            service: Arc::new(TokenService::new(&config, factory)?),
            sessions: WalletSessions::new(),
            shutdown: shutdown.clone(),
            request_deadline: Duration::from_secs(config.listener.request_timeout_secs),
        };
        let router = Self::build_router(&config.listener, state);
        Ok(Self {
            router,
            config,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request deadline is enforced inside the handlers, never by dropping them.
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            })
            .on_response(DefaultOnResponse::new().level(Level::INFO));

        Router::new()
            .route("/mint", post(handlers::mint))
            .route("/transfer", post(handlers::transfer))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(trace)
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.max_body_bytes)),
            )
    }

    /// The router, for serving elsewhere or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until shutdown is triggered, then let in-flight requests finish.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            network = %self.config.ledger.network,
            "HTTP server starting"
        );

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
