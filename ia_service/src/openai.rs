use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::{build_prompt, parse_reply, IaResult, IaServiceConfig, IaServiceError, OracleExtraction, PhoneOracle};

/// Oráculo via OpenAI (chat completions com resposta JSON)
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client<OpenAIConfig>,
    config: IaServiceConfig,
}

impl OpenAiOracle {
    pub fn new(config: IaServiceConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(ref base) = config.base_url {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config),
            config,
        }
    }
}

#[async_trait]
impl PhoneOracle for OpenAiOracle {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn extract(&self, document: &Value) -> IaResult<OracleExtraction> {
        tracing::info!("🤖 Consultando OpenAI ({}) para extrair telefone", self.config.model);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(build_prompt(document))
                    .build()
                    .map_err(|e| IaServiceError::ProviderError(format!("Failed to build message: {}", e)))?,
            )])
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| IaServiceError::ProviderError(format!("Failed to build request: {}", e)))?;

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(self.config.timeout_secs),
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| IaServiceError::ProviderError("OpenAI request timed out".to_string()))?
        .map_err(|e| IaServiceError::ProviderError(format!("API call failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| IaServiceError::ParseError("No content in response".to_string()))?;

        tracing::debug!("📋 Resposta OpenAI: {}", content);
        Ok(parse_reply(content))
    }
}
