//! Transporte WhatsApp
//!
//! Este crate define o contrato de envio usado pelo bot ([`Transport`]) e uma
//! implementação HTTP para um gateway WPPConnect ([`WppConnectClient`]).
//! Pareamento por QR code e ciclo de vida da sessão ficam no gateway.

pub mod client;
pub mod error;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

pub use client::{WppConnectClient, WppConnectConfig};
pub use error::{Result, TransportError};

/// Sufixo de contato individual do WhatsApp
pub const DEFAULT_JID_SUFFIX: &str = "c.us";

/// Identificador de destino (`<usuario>@<servidor>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: String,
    server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

/// Referência para a mídia enviada junto da legenda
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Arquivo local (enviado como base64)
    Path(PathBuf),
    /// URL pública (o gateway baixa)
    Url(String),
}

/// Canal de envio de mensagens
///
/// Implementações não são seguras para uso concorrente do ponto de vista da
/// sessão: quem chama deve serializar os envios (ver crate `mensageria`).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Envia texto simples
    async fn send_text(&self, to: &Jid, text: &str) -> Result<()>;

    /// Envia imagem com legenda
    async fn send_media_with_caption(&self, to: &Jid, media: &MediaRef, caption: &str) -> Result<()>;

    /// Verifica se a sessão está conectada
    async fn is_ready(&self) -> Result<bool>;
}
