use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    body::Body,
};
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use ia_service::OracleExtraction;

use crate::services::{DeliveryError, UpsellMessage};
use crate::utils::logging::*;
use crate::utils::phone::CanonicalPhone;
use crate::utils::{AppError, AppResult};
use crate::AppState;

const ENDPOINT: &str = "/webhook/yampi";

/// Webhook de pedido pago/confirmado da Yampi
///
/// Respostas:
/// - 200 `sent:false` quando o pedido é ignorado (evento fora da lista, sem telefone)
/// - 202 `queued:true` quando o envio foi para a fila
/// - 200 `sent:true` / 502 quando `await_delivery` está ligado
pub async fn handle_yampi_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<Body>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let start_time = Instant::now();
    let webhook_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    log_request_received(ENDPOINT, "POST");

    let body_bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read request body: {}", e)))?;

    let webhook = &state.settings.webhook;
    if webhook.validate_signature {
        // Settings::validate barra isso na subida; sem segredo nada passa
        let secret = webhook.signing_secret().ok_or_else(|| {
            log_validation_error("webhook_signature", "validate_signature sem segredo configurado");
            AppError::SignatureError("Webhook secret not configured".to_string())
        })?;
        verify_webhook_signature(&headers, &webhook.signature_header, &body_bytes, secret)?;
    }

    let document: Value = serde_json::from_slice(&body_bytes).map_err(|e| {
        log_validation_error("payload", &format!("Invalid JSON: {}", e));
        AppError::ValidationError(format!("Invalid JSON payload: {}", e))
    })?;

    tracing::debug!("📦 Payload do webhook {}: {}", webhook_id, document);

    if let Some(event) = rejected_event(&document, &webhook.accepted_events) {
        log_webhook_ignored(&webhook_id, &format!("evento '{}' não aceito", event));
        return Ok(ignored("ignored_event"));
    }

    let (phone, hints) = resolve_phone(&state, &document).await;
    let Some(phone) = phone else {
        log_webhook_ignored(&webhook_id, "nenhum telefone válido no payload");
        return Ok(ignored("no_phone"));
    };

    let message = match hints {
        Some(ref hints) => UpsellMessage::from_document_with_hints(&document, hints, &state.settings.offer),
        None => UpsellMessage::from_document(&document, &state.settings.offer),
    };

    let handle = state.dispatcher.dispatch(&phone, message.text);
    let job_id = handle.id();
    log_send_queued(job_id, &phone, state.dispatcher.queue_stats().pending);

    if webhook.await_delivery {
        let outcome = handle.await.map_err(DeliveryError::from).and_then(|sent| sent);
        let status = if outcome.is_ok() { 200 } else { 502 };
        log_request_processed(ENDPOINT, status, start_time.elapsed().as_millis() as u64);
        outcome?;

        return Ok((
            StatusCode::OK,
            Json(json!({ "ok": true, "sent": true, "phone": phone, "jobId": job_id })),
        ));
    }

    let order_id = message.order_id;
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(())) => log_info(&format!("✅ Oferta do pedido {} entregue (job #{})", order_id, job_id)),
            Ok(Err(e)) => log_error(&format!("❌ Oferta do pedido {} não entregue: {}", order_id, e)),
            Err(e) => log_error(&format!("❌ Job #{} perdido: {}", job_id, e)),
        }
    });

    log_request_processed(ENDPOINT, 202, start_time.elapsed().as_millis() as u64);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "queued": true, "phone": phone, "jobId": job_id })),
    ))
}

fn ignored(reason: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "ok": true, "sent": false, "reason": reason })))
}

/// Evento do payload quando está fora da lista aceita (lista vazia = aceita tudo)
fn rejected_event(document: &Value, accepted: &[String]) -> Option<String> {
    if accepted.is_empty() {
        return None;
    }

    let event = document.get("event").and_then(Value::as_str).unwrap_or_default();
    (!accepted.iter().any(|a| a == event)).then(|| event.to_string())
}

/// Estratégias locais primeiro; o oráculo de IA só entra se elas falharem
async fn resolve_phone(state: &AppState, document: &Value) -> (Option<CanonicalPhone>, Option<OracleExtraction>) {
    if let Some(phone) = state.resolver.resolve(document) {
        return (Some(phone), None);
    }

    let Some(ref oracle) = state.oracle else {
        return (None, None);
    };

    match oracle.extract(document).await {
        Ok(extraction) => {
            let phone = extraction
                .phone
                .as_deref()
                .and_then(|raw| state.resolver.normalize_candidate(raw));
            match phone {
                Some(ref p) => log_phone_resolved(oracle.provider(), "oráculo de IA", p),
                None => log_warning(&format!(
                    "⚠️ Oráculo {} não devolveu telefone válido: {:?}",
                    oracle.provider(),
                    extraction.phone
                )),
            }
            (phone, Some(extraction))
        }
        Err(e) => {
            log_warning(&format!("⚠️ Falha no oráculo {}: {}", oracle.provider(), e));
            (None, None)
        }
    }
}

fn verify_webhook_signature(
    headers: &HeaderMap,
    header_name: &str,
    body: &[u8],
    secret: &str,
) -> AppResult<()> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let signature_header = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::SignatureError(format!("Missing {} header", header_name)))?;

    // Remove o prefixo "sha256=" se presente
    let signature = signature_header.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::SignatureError(format!("Invalid secret key: {}", e)))?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();

    // Yampi manda base64; aceitamos hex também
    let as_base64 = base64::engine::general_purpose::STANDARD.encode(digest);
    let as_hex = hex::encode(digest);

    if !constant_time_eq(signature.as_bytes(), as_base64.as_bytes())
        && !constant_time_eq(signature.to_ascii_lowercase().as_bytes(), as_hex.as_bytes())
    {
        log_validation_error("webhook_signature", "Invalid signature");
        return Err(AppError::SignatureError("Invalid webhook signature".to_string()));
    }

    Ok(())
}

// Comparação de tempo constante para evitar timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
