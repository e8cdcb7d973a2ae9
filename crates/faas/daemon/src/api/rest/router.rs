//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Functions
        .route("/functions", get(handlers::list_all_functions))
        .route(
            "/namespaces/:namespace/functions",
            get(handlers::list_functions).post(handlers::create_function),
        )
        .route(
            "/namespaces/:namespace/functions/:name",
            get(handlers::get_function)
                .put(handlers::update_function)
                .delete(handlers::delete_function),
        )
        .route(
            "/namespaces/:namespace/functions/:name/units",
            get(handlers::list_function_units),
        );

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
