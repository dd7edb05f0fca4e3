//! LLM 텍스트 생성.
//!
//! 분석 결과 요약은 [`TextGenerator`]를 통해서만 요청합니다. 구현체는
//! OpenAI 호환 `/chat/completions` API를 호출하는 [`OpenAiChatClient`]입니다.

use async_trait::async_trait;
use insight_core::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{AnalysisError, AnalysisResult};

/// 텍스트 생성기.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 시스템 지시와 사용자 프롬프트로 텍스트를 생성합니다.
    async fn generate(&self, system: &str, prompt: &str) -> AnalysisResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 호환 Chat Completions 클라이언트.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiChatClient {
    pub fn new(
        api_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> AnalysisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Llm(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(api_url),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }

    /// 설정에서 클라이언트를 생성합니다. API 키가 없으면 `None`.
    pub fn from_config(config: &LlmConfig) -> AnalysisResult<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            info!("LLM API key not configured, AI summaries disabled");
            return Ok(None);
        };

        let client = Self::new(
            &config.api_url,
            api_key,
            config.model.clone(),
            config.max_tokens,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, endpoint = %client.endpoint, "LLM client configured");
        Ok(Some(client))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// `.../v1` 또는 전체 엔드포인트 URL을 `/chat/completions` URL로 정규화합니다.
fn chat_endpoint(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

fn extract_content(response: ChatResponse) -> AnalysisResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AnalysisError::Llm("empty completion".to_string()))
}

#[async_trait]
impl TextGenerator for OpenAiChatClient {
    #[instrument(skip(self, system, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, system: &str, prompt: &str) -> AnalysisResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Llm(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Llm(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Llm(format!("invalid response: {}", e)))?;

        let content = extract_content(parsed)?;
        debug!(len = content.len(), "Completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_endpoint() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8000/v1/chat/completions/"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 16,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "max_tokens": 16})
        );
    }

    #[test]
    fn test_extract_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  summary  "}}]
        }))
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "summary");

        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(extract_content(empty), Err(AnalysisError::Llm(_))));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = LlmConfig::default();
        assert!(OpenAiChatClient::from_config(&config).unwrap().is_none());

        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let client = OpenAiChatClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.model(), "gpt-4o");
    }
}
