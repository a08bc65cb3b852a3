//! Envio da oferta pelo WhatsApp, sempre através da fila single-flight

use std::sync::Arc;
use std::time::Duration;

use mensageria::{deadline, DeadlineElapsed, JobHandle, QueueError, QueueStats, SendQueue};
use thiserror::Error;
use wpp::{Jid, MediaRef, Transport, TransportError};

use crate::utils::logging::log_send_failed;
use crate::utils::phone::CanonicalPhone;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("envio abortado: {0}")]
    TimedOut(#[from] DeadlineElapsed),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Monta os jobs de envio e entrega para a fila
#[derive(Clone)]
pub struct Dispatcher {
    queue: SendQueue,
    transport: Arc<dyn Transport>,
    media: Option<MediaRef>,
    jid_suffix: String,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(queue: SendQueue, transport: Arc<dyn Transport>) -> Self {
        Self {
            queue,
            transport,
            media: None,
            jid_suffix: wpp::DEFAULT_JID_SUFFIX.to_string(),
            send_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_media(mut self, media: Option<MediaRef>) -> Self {
        self.media = media;
        self
    }

    pub fn with_jid_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.jid_suffix = suffix.into();
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Enfileira o envio e devolve o handle do job sem esperar
    pub fn dispatch(&self, phone: &CanonicalPhone, text: String) -> JobHandle<Result<(), DeliveryError>> {
        let transport = Arc::clone(&self.transport);
        let media = self.media.clone();
        let jid = phone.to_jid(&self.jid_suffix);
        let limit = self.send_timeout;
        let phone = phone.clone();

        self.queue.enqueue(move || async move {
            match deadline(limit, send_offer(transport.as_ref(), &jid, media.as_ref(), &text)).await {
                Ok(Ok(())) => {
                    tracing::info!("📤 Mensagem de upsell enviada para {}", jid);
                    Ok(())
                }
                Ok(Err(e)) => {
                    log_send_failed(&phone, &e.to_string());
                    Err(DeliveryError::Transport(e))
                }
                Err(elapsed) => {
                    log_send_failed(&phone, &elapsed.to_string());
                    Err(DeliveryError::TimedOut(elapsed))
                }
            }
        })
    }
}

async fn send_offer(
    transport: &dyn Transport,
    to: &Jid,
    media: Option<&MediaRef>,
    text: &str,
) -> wpp::Result<()> {
    let Some(media) = media else {
        return transport.send_text(to, text).await;
    };

    match transport.send_media_with_caption(to, media, text).await {
        Err(TransportError::MediaError(reason)) => {
            tracing::warn!("⚠️ Mídia da oferta falhou ({}); enviando só o texto", reason);
            transport.send_text(to, text).await
        }
        other => other,
    }
}
