//! Transporte falso para testes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use wpp::{Jid, MediaRef, Transport, TransportError};

#[derive(Default)]
pub struct RecordingTransport {
    /// Espera dentro de cada envio
    pub delay: Duration,
    pub fail_media: bool,
    /// Responde NotReady para este destino
    pub not_ready_for: Option<String>,
    /// Número de chamadas a is_ready que ainda respondem `false`
    pub ready_after_polls: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, entry: String, to: &Jid) -> wpp::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(entry);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.not_ready_for.as_deref() == Some(to.user()) {
            return Err(TransportError::NotReady("sessão desconectada".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, to: &Jid, text: &str) -> wpp::Result<()> {
        self.record(format!("text {} {}", to, text), to).await
    }

    async fn send_media_with_caption(&self, to: &Jid, _media: &MediaRef, caption: &str) -> wpp::Result<()> {
        self.record(format!("media {} {}", to, caption), to).await?;
        if self.fail_media {
            return Err(TransportError::MediaError("arquivo ilegível".to_string()));
        }
        Ok(())
    }

    async fn is_ready(&self) -> wpp::Result<bool> {
        let remaining = self.ready_after_polls.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(true);
        }
        self.ready_after_polls.store(remaining - 1, Ordering::SeqCst);
        Ok(false)
    }
}
