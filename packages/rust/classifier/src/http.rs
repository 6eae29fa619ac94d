//! OpenAI-compatible chat-completions classifier.

use std::time::Duration;

use budgetlens_shared::{BudgetLensError, ClassifierConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Classifier, ClassifyRequest};

const USER_AGENT: &str = concat!("budgetlens/", env!("CARGO_PKG_VERSION"));

/// Classifier that calls `{base_url}/chat/completions` with bearer auth.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClassifier {
    /// Build a classifier from config, reading the API key from the env var
    /// named by `api_key_env`.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                BudgetLensError::config(format!(
                    "classifier API key not found. Set the {} environment variable.",
                    config.api_key_env
                ))
            })?;
        Self::new(config.base_url()?, api_key, config.model.clone(), config.timeout())
    }

    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", base_url.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| BudgetLensError::config(format!("invalid classifier endpoint: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                BudgetLensError::Classifier(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Classifier for OpenAiClassifier {
    async fn classify(&self, request: ClassifyRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.text,
                },
            ],
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BudgetLensError::Classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(BudgetLensError::Classifier(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BudgetLensError::Classifier(format!("invalid response body: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BudgetLensError::Classifier("response has no choices".into()))?;

        tracing::trace!(text = %request.text, answer = %answer, "classifier answered");
        Ok(answer.trim().to_string())
    }
}
