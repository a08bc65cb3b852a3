use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{build_prompt, parse_reply, IaResult, IaServiceConfig, IaServiceError, OracleExtraction, PhoneOracle};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Oráculo via API REST do Gemini
#[derive(Clone)]
pub struct GeminiOracle {
    http: reqwest::Client,
    config: IaServiceConfig,
}

impl GeminiOracle {
    pub fn new(config: IaServiceConfig) -> IaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| IaServiceError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
        format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl PhoneOracle for GeminiOracle {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn extract(&self, document: &Value) -> IaResult<OracleExtraction> {
        tracing::info!("🤖 Consultando Gemini ({}) para extrair telefone", self.config.model);

        let body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": build_prompt(document) }] }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IaServiceError::ProviderError(format!("Gemini status {}: {}", status, text)));
        }

        let payload: Value = response.json().await?;
        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| IaServiceError::ParseError("No text in Gemini response".to_string()))?;

        tracing::debug!("📋 Resposta Gemini: {}", text);
        Ok(parse_reply(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provider;
    use httpmock::prelude::*;

    fn oracle_for(server: &MockServer) -> GeminiOracle {
        GeminiOracle::new(
            IaServiceConfig::new(Provider::Gemini, "chave".to_string()).with_base_url(server.base_url()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_reads_first_candidate_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-pro:generateContent")
                    .query_param("key", "chave")
                    .body_contains("PAYLOAD:");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": { "parts": [{ "text": "{\"phone_full\": \"(31) 99844-4969\", \"first_name\": \"Joana\"}" }] }
                    }]
                }));
            })
            .await;

        let extraction = oracle_for(&server)
            .extract(&json!({"cliente": {"contato": "(31) 99844-4969"}}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(extraction.phone.as_deref(), Some("(31) 99844-4969"));
        assert_eq!(extraction.first_name.as_deref(), Some("Joana"));
    }

    #[tokio::test]
    async fn test_extract_surfaces_provider_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(403).body("API key not valid");
            })
            .await;

        let err = oracle_for(&server).extract(&json!({})).await.unwrap_err();
        assert!(matches!(err, IaServiceError::ProviderError(_)));
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"candidates": []}));
            })
            .await;

        let err = oracle_for(&server).extract(&json!({})).await.unwrap_err();
        assert!(matches!(err, IaServiceError::ParseError(_)));
    }
}
