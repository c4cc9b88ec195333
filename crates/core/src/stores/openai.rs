use crate::config::OpenAiConfig;
use crate::http::ensure_success;
use crate::traits::AnswerGenerator;
use crate::{ChatMessage, RagError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

pub struct AzureOpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl AzureOpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }
}

/// Text of the first choice. A `null` content reads as an empty answer.
pub fn first_choice_content(body: &Value) -> Result<String, RagError> {
    let choice = body
        .pointer("/choices/0")
        .ok_or_else(|| RagError::Backend {
            backend: "openai".to_string(),
            details: "response contained no choices".to_string(),
        })?;

    Ok(choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl AnswerGenerator for AzureOpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, RagError> {
        info!(
            deployment = %self.config.deployment,
            messages = messages.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&json!({
                "messages": messages,
                "temperature": temperature,
            }))
            .send()
            .await?;

        let response = ensure_success(response, "openai").await?;
        let body: Value = response.json().await?;
        first_choice_content(&body)
    }
}
