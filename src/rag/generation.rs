use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::config::GenerationSettings;
use crate::error::RagError;
use crate::models::{ChatRequest, ChatResponse, Message};

/// Prompt → answer text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// OpenAI-compatible `/chat/completions` client (LiteLLM, vLLM, OpenAI).
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionsGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| RagError::Config(format!("generation client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(temperature),
            max_tokens: None,
            stream: Some(false),
        };

        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("{} answered {}: {}", self.model, status, detail);
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} returned an empty completion", self.model))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health/liveliness", self.base_url);

        let response = self.client.get(&url).send().await?;

        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let settings = GenerationSettings {
            api_base: "http://localhost:4000/".to_string(),
            ..Default::default()
        };
        let generator = ChatCompletionsGenerator::new(&settings).unwrap();
        assert_eq!(generator.base_url, "http://localhost:4000");
        assert_eq!(generator.model_id(), "gpt-4-turbo-preview");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let settings = GenerationSettings {
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_ms: 500,
            ..Default::default()
        };
        let generator = ChatCompletionsGenerator::new(&settings).unwrap();
        assert!(generator.generate("hello", 0.1).await.is_err());
    }

    async fn serve(reply: serde_json::Value) -> String {
        let app = axum::Router::new().route(
            "/chat/completions",
            axum::routing::post(move |axum::Json(request): axum::Json<ChatRequest>| {
                let reply = reply.clone();
                async move {
                    assert_eq!(request.messages[0].role, "user");
                    assert_eq!(request.stream, Some(false));
                    axum::Json(reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let api_base = serve(serde_json::json!({
            "id": "cmpl-1",
            "model": "gpt-4-turbo-preview",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "Copper is at $9,500/ton." } }
            ]
        }))
        .await;
        let generator = ChatCompletionsGenerator::new(&GenerationSettings {
            api_base,
            ..Default::default()
        })
        .unwrap();

        let answer = generator.generate("copper price?", 0.1).await.unwrap();
        assert_eq!(answer, "Copper is at $9,500/ton.");
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let api_base = serve(serde_json::json!({ "id": "cmpl-2", "model": "m", "choices": [] })).await;
        let generator = ChatCompletionsGenerator::new(&GenerationSettings {
            api_base,
            ..Default::default()
        })
        .unwrap();

        let err = generator.generate("copper price?", 0.1).await.unwrap_err();
        assert!(err.to_string().contains("empty completion"));
    }
}
