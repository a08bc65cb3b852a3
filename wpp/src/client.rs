use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::{Jid, MediaRef, Transport};

/// Configuração do gateway WPPConnect
#[derive(Debug, Clone)]
pub struct WppConnectConfig {
    /// URL base do servidor (ex: http://localhost:21465)
    pub base_url: String,
    /// Nome da sessão no gateway
    pub session: String,
    /// Bearer token gerado pelo gateway para a sessão
    pub token: Option<String>,
    /// Timeout por requisição em segundos
    pub timeout_secs: u64,
}

impl WppConnectConfig {
    pub fn new(base_url: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session: session.into(),
            token: None,
            timeout_secs: 30,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Cliente HTTP do gateway
#[derive(Clone)]
pub struct WppConnectClient {
    http: Client,
    config: WppConnectConfig,
}

impl WppConnectClient {
    pub fn new(config: WppConnectConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(TransportError::ConfigError("WPP base_url vazio".to_string()));
        }
        if config.session.trim().is_empty() {
            return Err(TransportError::ConfigError("WPP session vazio".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        tracing::info!(
            "✅ WppConnectClient configurado (sessão '{}' em {})",
            config.session,
            config.base_url
        );

        Ok(Self { http, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.session,
            action
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json(&self, action: &str, body: &Value) -> Result<Value> {
        let request = self.authorize(self.http.post(self.endpoint(action)).json(body));
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), text));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

/// Sessão caída chega como erro genérico do gateway; separa do resto pelo texto
fn classify_failure(status: u16, message: String) -> TransportError {
    let lower = message.to_lowercase();
    let disconnected = ["disconnected", "not connected", "closed", "notlogged", "qrcode"]
        .iter()
        .any(|marker| lower.contains(marker));

    if disconnected {
        TransportError::NotReady(message)
    } else {
        TransportError::ApiError { status, message }
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Transport for WppConnectClient {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<()> {
        let body = json!({
            "phone": to.user(),
            "isGroup": false,
            "message": text,
        });

        self.post_json("send-message", &body).await?;
        tracing::info!("📤 Mensagem enviada com sucesso para {}", to);
        Ok(())
    }

    async fn send_media_with_caption(&self, to: &Jid, media: &MediaRef, caption: &str) -> Result<()> {
        let mut body = json!({
            "phone": to.user(),
            "isGroup": false,
            "caption": caption,
        });

        match media {
            MediaRef::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    TransportError::MediaError(format!("falha ao ler {}: {}", path.display(), e))
                })?;
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("imagem")
                    .to_string();

                body["filename"] = json!(filename);
                body["base64"] = json!(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)));
            }
            MediaRef::Url(url) => {
                body["filename"] = json!(url.rsplit('/').next().unwrap_or("imagem"));
                body["path"] = json!(url);
            }
        }

        self.post_json("send-image", &body).await?;
        tracing::info!("🖼️ Imagem com legenda enviada com sucesso para {}", to);
        Ok(())
    }

    async fn is_ready(&self) -> Result<bool> {
        let request = self.authorize(self.http.get(self.endpoint("check-connection-session")));
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Sessão '{}' ainda não conectada (status {})", self.config.session, status);
            return Ok(false);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok(body.get("status").and_then(Value::as_bool).unwrap_or(false))
    }
}
