//! Route definitions for the gateway API.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{auth, handlers, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", openai_routes())
        // Clients configured with an `/hf` base URL
        .nest("/hf/v1", openai_routes())
        .nest("/v1beta", native_routes())
        .nest("/admin", admin_routes())
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// OpenAI-compatible API routes
fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(handlers::chat_completion))
        .route("/models", get(handlers::list_models))
}

/// Native API routes
fn native_routes() -> Router<AppState> {
    Router::new()
        .route("/models", get(handlers::list_native_models))
        .route("/models/:model_action", post(handlers::native_generate))
}

/// Credential pool management
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/pool", get(handlers::pool_status))
        .route("/pool/reset", post(handlers::pool_reset))
}
