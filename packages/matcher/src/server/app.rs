//! Application setup and router wiring.

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::{sse, MatcherService};
use crate::server::routes::{
    cancel_need_handler, confirm_assignment_handler, fulfill_need_handler, get_assignment_handler,
    health_handler, register_responder_handler, submit_need_handler, unmatched_needs_handler,
    update_responder_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub service: MatcherService,
}

/// Build the Axum application router.
///
/// The ingest routes are the wire form of the feed contract; embedders using
/// the library call `MatcherService` directly instead.
pub fn build_app(service: MatcherService) -> Router {
    let state = AxumAppState {
        service: service.clone(),
    };

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/api/needs", post(submit_need_handler))
        .route("/api/needs/unmatched", get(unmatched_needs_handler))
        .route("/api/needs/{need_id}/cancel", post(cancel_need_handler))
        .route("/api/needs/{need_id}/fulfill", post(fulfill_need_handler))
        .route("/api/responders", post(register_responder_handler))
        .route("/api/responders/{responder_id}", patch(update_responder_handler))
        .route("/api/assignments/{need_id}", get(get_assignment_handler))
        .route(
            "/api/assignments/{need_id}/confirm",
            post(confirm_assignment_handler),
        )
        .with_state(state);

    api.merge(sse::router(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
