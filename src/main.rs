//! Component server entry point.
//!
//! Boots a small demonstration app: scans configured component roots (when
//! present), registers a status endpoint and a welcome page, freezes the
//! dispatch table, and serves.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;

use component_server::app::AppBuilder;
use component_server::config::{load_config, ServerConfig};
use component_server::engine::state::Slot;
use component_server::handler::{handler_fn, Dependency, Flow, HandlerMeta, HandlerSet};
use component_server::http::HttpServer;
use component_server::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("component-server v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let app = build_app(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let server = HttpServer::new(app);
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn build_app(
    config: ServerConfig,
) -> Result<Arc<component_server::App>, component_server::BootError> {
    let mut builder = AppBuilder::new(config);

    if !builder_has_roots(&builder) {
        tracing::info!("no component roots configured; serving built-in handlers only");
    } else {
        let visited = builder.scan_components()?;
        tracing::info!(components = visited, "component tree scanned");
    }

    // Welcome page at the app root: /index/index collapses onto /.
    builder.register_handlers(
        "",
        "index",
        HandlerSet::new().handler(
            "index",
            HandlerMeta::new().dependencies([Dependency::Request]),
            handler_fn(|call| async move {
                call.state.send("message", json!("component server is running"));
                call.state
                    .send("path", json!(call.state.request.path.clone()));
                Ok(Flow::Done)
            }),
        ),
    )?;

    // Liveness endpoint.
    builder.register_handlers(
        "/status",
        "api",
        HandlerSet::new().handler(
            "health",
            HandlerMeta::new()
                .methods(["get"])
                .dependencies([Dependency::Query]),
            handler_fn(|call| async move {
                call.state.send("status", json!("ok"));
                Ok(Flow::Done)
            }),
        ),
    )?;

    // Generic error page, reachable from error-path dispatch.
    builder.register_handlers(
        "/error",
        "index",
        HandlerSet::new().handler(
            "index",
            HandlerMeta::new()
                .cascade()
                .accept_errors()
                .dependencies([Dependency::Params]),
            handler_fn(|call| async move {
                let status = call
                    .state
                    .doc_slot(Slot::Params)
                    .lock()
                    .expect("params doc mutex poisoned")
                    .get("status")
                    .cloned()
                    .unwrap_or(json!(500));
                call.state.send("error", status);
                Ok(Flow::Done)
            }),
        ),
    )?;

    Ok(Arc::new(builder.build()))
}

fn builder_has_roots(builder: &AppBuilder) -> bool {
    !builder.config().components.roots.is_empty()
}
