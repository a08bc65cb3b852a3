//! Oráculo de IA para payloads de webhook
//!
//! Recebe um JSON de qualquer origem e devolve, no melhor esforço, telefone,
//! primeiro nome e número do pedido. A resposta NUNCA é confiável por si só:
//! o telefone devolvido passa pela mesma normalização de qualquer outro candidato.
//!
//! Provedores:
//! - Gemini (REST `generateContent`)
//! - OpenAI (async-openai, resposta em JSON)

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use gemini::GeminiOracle;
pub use openai::OpenAiOracle;

/// Erros do serviço de IA
#[derive(Debug, Error)]
pub enum IaServiceError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type IaResult<T> = Result<T, IaServiceError>;

/// Campos extraídos pelo oráculo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleExtraction {
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub order_id: Option<String>,
}

/// Fonte externa de candidatos
#[async_trait]
pub trait PhoneOracle: Send + Sync {
    /// Nome do provedor (para logs)
    fn provider(&self) -> &'static str;

    async fn extract(&self, document: &Value) -> IaResult<OracleExtraction>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

/// Configuração do oráculo
#[derive(Clone)]
pub struct IaServiceConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Modelo (padrão: gemini-2.5-pro / gpt-4o-mini)
    pub model: String,
    /// Sobrescreve a URL base da API (testes, proxies)
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u16,
    pub timeout_secs: u64,
}

impl IaServiceConfig {
    pub fn new(provider: Provider, api_key: String) -> Self {
        let model = match provider {
            Provider::Gemini => "gemini-2.5-pro",
            Provider::OpenAi => "gpt-4o-mini",
        };

        Self {
            provider,
            api_key,
            model: model.to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 200,
            timeout_secs: 20,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u16) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Cria o oráculo do provedor configurado
pub fn build_oracle(config: IaServiceConfig) -> IaResult<Arc<dyn PhoneOracle>> {
    if config.api_key.trim().is_empty() {
        return Err(IaServiceError::ConfigError("API key ausente".to_string()));
    }

    let oracle: Arc<dyn PhoneOracle> = match config.provider {
        Provider::Gemini => Arc::new(GeminiOracle::new(config)?),
        Provider::OpenAi => Arc::new(OpenAiOracle::new(config)),
    };

    tracing::info!("✅ Oráculo de IA inicializado ({})", oracle.provider());
    Ok(oracle)
}

const EXTRACTION_PROMPT: &str = r#"Você recebe o JSON de um webhook de pedido (qualquer plataforma, qualquer formato).
Encontre o telefone do cliente, o primeiro nome e o número do pedido.
- Procure campos como phone, whatsapp, mobile, full_number, number, area_code, customer_phone.
- Se o telefone vier separado em area_code + number, junte os dois.
- Máscaras (+55, espaços, traços, parênteses) são aceitas.
Responda SOMENTE com um objeto JSON, sem texto extra:
{"phone_full": "<telefone ou null>", "first_name": "<nome ou null>", "order_id": "<pedido ou null>"}"#;

/// Monta o prompt completo com o payload
pub fn build_prompt(document: &Value) -> String {
    let payload = serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string());
    format!("{}\n\nPAYLOAD:\n{}", EXTRACTION_PROMPT, payload)
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(default)]
    phone_full: Option<Value>,
    #[serde(default)]
    first_name: Option<Value>,
    #[serde(default)]
    order_id: Option<Value>,
}

fn scalar_to_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() && s.trim() != "null" => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpreta a resposta textual do modelo
///
/// Aceita JSON puro, JSON cercado por ```json ... ``` ou texto livre; neste
/// último caso os dígitos do texto viram o telefone.
pub fn parse_reply(text: &str) -> OracleExtraction {
    let trimmed = text.trim();
    let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };

    if let Ok(raw) = serde_json::from_str::<RawReply>(json_slice) {
        return OracleExtraction {
            phone: scalar_to_string(raw.phone_full),
            first_name: scalar_to_string(raw.first_name),
            order_id: scalar_to_string(raw.order_id),
        };
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    OracleExtraction {
        phone: (!digits.is_empty()).then_some(digits),
        ..OracleExtraction::default()
    }
}
