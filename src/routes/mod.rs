// JSON HTTP surface over the monitor. Rendering and charts live elsewhere.

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::Monitor;
use crate::prober::Probe;

pub(crate) struct AppState<P> {
    pub(crate) monitor: Arc<Monitor<P>>,
}

// Derived Clone would require P: Clone.
impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            monitor: self.monitor.clone(),
        }
    }
}

pub fn app<P: Probe>(monitor: Arc<Monitor<P>>) -> Router {
    let state = AppState { monitor };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route(
            "/api/targets",
            get(http::list_targets::<P>)
                .post(http::add_target::<P>)
                .delete(http::remove_target::<P>),
        ) // GET, POST, DELETE /api/targets
        .route(
            "/api/interval",
            get(http::get_interval::<P>).put(http::set_interval::<P>),
        ) // GET, PUT /api/interval
        .route("/api/samples", get(http::recent_samples::<P>)) // GET /api/samples?days=N
        .route("/api/buckets", get(http::buckets::<P>)) // GET /api/buckets
        .route("/download_csv", get(http::download_csv::<P>)) // GET /download_csv
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
