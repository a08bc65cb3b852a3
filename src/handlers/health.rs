use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    Json(json!({
        "ok": true,
        "service": "yampi-upsell-bot",
        "version": env!("CARGO_PKG_VERSION"),
        "whatsappReadyAt": state.ready_clock.ready_at(),
        "queue": state.dispatcher.queue_stats(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// 200 só depois que a sessão do WhatsApp conectou
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    if !state.ready_clock.is_ready() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(json!({
        "ready": true,
        "whatsappReadyAt": state.ready_clock.ready_at()
    })))
}
