use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

use crate::utils::phone::NormalizationPolicy;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub whatsapp: WhatsAppSettings,
    pub offer: OfferSettings,
    pub webhook: WebhookSettings,
    pub phone: PhoneSettings,
    pub ai: AiSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Gateway WPPConnect que mantém a sessão do WhatsApp
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WhatsAppSettings {
    pub base_url: String,
    pub session_name: String,
    pub token: Option<String>,
    pub jid_suffix: String,
    pub request_timeout_secs: u64,
    /// Intervalo entre verificações de sessão conectada
    pub ready_poll_secs: u64,
}

impl Default for WhatsAppSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:21465".to_string(),
            session_name: "upsell-bot".to_string(),
            token: None,
            jid_suffix: wpp::DEFAULT_JID_SUFFIX.to_string(),
            request_timeout_secs: 30,
            ready_poll_secs: 5,
        }
    }
}

/// Oferta enviada após o pedido confirmado
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OfferSettings {
    /// Imagem da oferta (None = só texto)
    pub image_url: Option<String>,
    pub local_image_name: String,
    pub media_dir: String,
    pub coupon: String,
    pub site: String,
    /// Template com {nome}, {pedido}, {cupom}, {site}
    pub template: Option<String>,
}

impl Default for OfferSettings {
    fn default() -> Self {
        Self {
            image_url: None,
            local_image_name: "oferta.png".to_string(),
            media_dir: "media".to_string(),
            coupon: "FLZ30".to_string(),
            site: "www.aquafitbrasil.com".to_string(),
            template: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WebhookSettings {
    pub secret: Option<String>,
    pub validate_signature: bool,
    pub signature_header: String,
    /// Eventos aceitos (vazio = todos)
    pub accepted_events: Vec<String>,
    /// Responde só depois do envio terminar
    pub await_delivery: bool,
    /// Prazo de cada envio dentro da fila
    pub send_timeout_secs: u64,
}

impl WebhookSettings {
    /// Segredo do HMAC, ignorando valor vazio
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: None,
            validate_signature: false,
            signature_header: "X-Yampi-Hmac-SHA256".to_string(),
            accepted_events: Vec::new(),
            await_delivery: false,
            send_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PhoneSettings {
    pub accept_fixed_line: bool,
    pub strip_trunk_zero: bool,
    pub collapse_duplicate_country_code: bool,
    /// JSON pointers extras, consultados antes dos campos padrão
    pub extra_field_paths: Vec<String>,
}

impl Default for PhoneSettings {
    fn default() -> Self {
        let policy = NormalizationPolicy::default();
        Self {
            accept_fixed_line: policy.accept_fixed_line,
            strip_trunk_zero: policy.strip_trunk_zero,
            collapse_duplicate_country_code: policy.collapse_duplicate_country_code,
            extra_field_paths: Vec::new(),
        }
    }
}

impl PhoneSettings {
    pub fn policy(&self) -> NormalizationPolicy {
        NormalizationPolicy {
            accept_fixed_line: self.accept_fixed_line,
            strip_trunk_zero: self.strip_trunk_zero,
            collapse_duplicate_country_code: self.collapse_duplicate_country_code,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AiSettings {
    pub enabled: bool,
    pub provider: ia_service::Provider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ia_service::Provider::Gemini,
            api_key: None,
            model: None,
            timeout_secs: 20,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("UPSELL").separator("__"));

        // Variáveis legadas do bot em Node
        let legacy = [
            ("PORT", "server.port"),
            ("SESSION_NAME", "whatsapp.session_name"),
            ("WPP_BASE_URL", "whatsapp.base_url"),
            ("WPP_TOKEN", "whatsapp.token"),
            ("IMAGE_URL", "offer.image_url"),
            ("LOCAL_IMAGE_NAME", "offer.local_image_name"),
            ("YAMPI_WEBHOOK_SECRET", "webhook.secret"),
        ];
        for (var, key) in legacy {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            builder = builder
                .set_override("ai.enabled", true)?
                .set_override("ai.provider", "gemini")?
                .set_override("ai.api_key", key)?;
            if let Ok(model) = std::env::var("GEMINI_MODEL") {
                builder = builder.set_override("ai.model", model)?;
            }
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder = builder
                .set_override("ai.enabled", true)?
                .set_override("ai.provider", "openai")?
                .set_override("ai.api_key", key)?;
        }

        let s = builder.build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Combinações que não podem subir
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.validate_signature && self.webhook.signing_secret().is_none() {
            return Err(ConfigError::Message(
                "webhook.validate_signature ligado sem webhook.secret (ou YAMPI_WEBHOOK_SECRET)".to_string(),
            ));
        }
        Ok(())
    }

    /// Configuração do oráculo de IA, se habilitado e com chave
    pub fn ia_config(&self) -> Option<ia_service::IaServiceConfig> {
        if !self.ai.enabled {
            return None;
        }

        let api_key = self.ai.api_key.clone().filter(|k| !k.trim().is_empty())?;
        let mut config = ia_service::IaServiceConfig::new(self.ai.provider, api_key)
            .with_timeout_secs(self.ai.timeout_secs);
        if let Some(ref model) = self.ai.model {
            config = config.with_model(model.clone());
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.whatsapp.jid_suffix, "c.us");
        assert_eq!(settings.webhook.signature_header, "X-Yampi-Hmac-SHA256");
        assert!(settings.phone.policy().accept_fixed_line);
        assert!(settings.ia_config().is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [phone]
                accept_fixed_line = false
                extra_field_paths = ["/buyer/mobile"]

                [webhook]
                accepted_events = ["order.paid"]
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(!settings.phone.policy().accept_fixed_line);
        assert!(settings.phone.policy().strip_trunk_zero);
        assert_eq!(settings.phone.extra_field_paths, vec!["/buyer/mobile"]);
        assert_eq!(settings.webhook.accepted_events, vec!["order.paid"]);
        assert_eq!(settings.offer.coupon, "FLZ30");
    }

    #[test]
    fn test_signature_validation_requires_secret() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.webhook.validate_signature = true;
        assert!(settings.validate().is_err());

        settings.webhook.secret = Some("   ".to_string());
        assert!(settings.validate().is_err());

        settings.webhook.secret = Some("segredo".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_ia_config_requires_key() {
        let mut settings = Settings::default();
        settings.ai.enabled = true;
        assert!(settings.ia_config().is_none());

        settings.ai.api_key = Some("chave".to_string());
        settings.ai.model = Some("gemini-2.5-flash".to_string());
        let config = settings.ia_config().unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
    }
}
