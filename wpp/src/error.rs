//! Tipos de erro para o crate wpp

use thiserror::Error;

/// Erros do transporte WhatsApp
#[derive(Debug, Error)]
pub enum TransportError {
    /// Sessão ainda não pareada/conectada
    #[error("WhatsApp session not ready: {0}")]
    NotReady(String),

    /// Erro de requisição HTTP
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Gateway respondeu com status não-2xx
    #[error("Gateway error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Mídia não pôde ser lida
    #[error("Media error: {0}")]
    MediaError(String),

    /// Erro de configuração
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, TransportError>;
