//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum router with the dispatch engine as its fallback
//! - Wire up middleware (tracing, timeout, request id); the body size cap
//!   is enforced during request extraction
//! - Mount the WebSocket endpoint
//! - Drive fallthroughs into error-path dispatch
//! - Persist session mutations after each chain
//!
//! # Design Decisions
//! - The dispatch core owns routing; axum sees a single fallback handler
//! - A fallthrough without an error handler degrades to a plain status
//!   response, never a hung connection

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::config::schema::ServerConfig;
use crate::engine::executor::{self, Completion};
use crate::engine::respond;
use crate::engine::state::{RouterState, Slot};
use crate::http::request;
use crate::http::websocket;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
}

/// HTTP server for the component dispatch core.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(app: Arc<App>) -> Self {
        let config = app.config.clone();
        let router = Self::build_router(&config, AppState { app });
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let mut router = Router::new();
        if config.socket.enabled {
            router = router.route(
                &config.socket.path,
                axum::routing::any(websocket::ws_handler),
            );
        }
        router
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.limits.request_timeout_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// The single entry point: every request funnels into the dispatch engine.
async fn dispatch_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let app = &state.app;
    let start = Instant::now();

    let info = request::extract(request, &app.sessions, &app.config).await;
    let method = info.method.clone();

    let (router_state, completion) = executor::dispatch(app, info).await;
    let outcome = match completion {
        Completion::Sent => "sent",
        Completion::Fallthrough => "fallthrough",
    };
    let response = complete(app, &router_state, completion).await;

    metrics::record_request(&method, response.status().as_u16(), outcome, start);
    response
}

/// Finish a chain: finalize on `Sent`, otherwise try the error path and
/// degrade to a plain status response.
pub(crate) async fn complete(
    app: &App,
    state: &RouterState,
    completion: Completion,
) -> Response {
    match completion {
        Completion::Sent => {
            persist_session(app, state);
            respond::finalize(state)
        }
        Completion::Fallthrough => {
            let status = if state.status() >= 400 { state.status() } else { 404 };
            let error_completion = executor::dispatch_error(app, state, status).await;
            persist_session(app, state);
            match error_completion {
                Completion::Sent => respond::finalize(state),
                Completion::Fallthrough => respond::fallthrough_response(status),
            }
        }
    }
}

/// Write the chain's session document back to the store. A chain that
/// created a session gets a cookie staged onto the response plan.
pub(crate) fn persist_session(app: &App, state: &RouterState) {
    let Some(doc) = state.try_doc(Slot::Session) else {
        return;
    };
    let values = doc.lock().expect("session doc mutex poisoned").clone();
    match &state.request.session_id {
        Some(id) => app.sessions.save(id, values),
        None => {
            let id = app.sessions.create(values);
            state.header(
                "set-cookie",
                format!(
                    "{name}={id}; Path=/; HttpOnly",
                    name = app.config.session.cookie_name
                ),
            );
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
