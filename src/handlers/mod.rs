// Rotas HTTP do bot
pub mod health;
pub mod webhook;

pub use health::*;
pub use webhook::*;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))

        // Webhook de pedido pago/confirmado
        .route("/webhook/yampi", post(handle_yampi_webhook))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
