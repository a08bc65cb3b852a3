use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use wpp::Transport;

/// Momento (epoch ms) em que a sessão do WhatsApp ficou pronta; 0 = ainda não
#[derive(Debug, Clone, Default)]
pub struct ReadyClock(Arc<AtomicI64>);

impl ReadyClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_at(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_at() > 0
    }

    /// Só o primeiro registro vale
    pub fn mark_ready(&self, epoch_ms: i64) -> bool {
        self.0
            .compare_exchange(0, epoch_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Consulta o gateway até a sessão conectar e registra o horário
pub fn spawn_ready_watch(transport: Arc<dyn Transport>, clock: ReadyClock, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            match transport.is_ready().await {
                Ok(true) => {
                    let now = chrono::Utc::now();
                    if clock.mark_ready(now.timestamp_millis()) {
                        tracing::info!("🕘 WhatsApp pronto desde {}", now.to_rfc3339());
                    }
                    return;
                }
                Ok(false) => tracing::debug!("⏳ Sessão do WhatsApp ainda não conectada"),
                Err(e) => tracing::warn!("⚠️ Falha ao consultar sessão do WhatsApp: {}", e),
            }
        }
    })
}
