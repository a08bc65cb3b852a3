use tracing::{info, warn, error, debug};

use super::phone::CanonicalPhone;

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Yampi upsell bot starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_phone_resolved(strategy: &str, source: &str, phone: &CanonicalPhone) {
    info!("📱 Telefone resolvido via {} ({}): {}", strategy, source, phone);
}

pub fn log_webhook_ignored(webhook_id: &str, reason: &str) {
    warn!("⚠️ Webhook {} ignorado: {}", webhook_id, reason);
}

pub fn log_send_queued(job_id: u64, phone: &CanonicalPhone, pending: usize) {
    info!("📬 Envio #{} para {} enfileirado ({} aguardando)", job_id, phone, pending);
}

pub fn log_send_failed(phone: &CanonicalPhone, error: &str) {
    error!("❌ Falha ao enviar mensagem para {}: {}", phone, error);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
