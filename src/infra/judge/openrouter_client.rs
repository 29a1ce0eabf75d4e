// OpenRouter chat-completions client backing the model moderation strategy.

use crate::core::moderation::{ModerationError, PolicyModel};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterJudge {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenRouterJudge {
    pub fn new(api_key: String, model: String) -> Result<Self, ModerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| ModerationError::Model(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl PolicyModel for OpenRouterJudge {
    async fn judge(&self, policy: &str, text: &str) -> Result<String, ModerationError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": policy },
                { "role": "user", "content": text },
            ],
            // Deterministic judgments; creativity is a liability here.
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModerationError::Model(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::Model(format!(
                "OpenRouter API error: {} - {}",
                status, body
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModerationError::Model(e.to_string()))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ModerationError::Model("Failed to parse response content".to_string())
            })?
            .to_string();

        Ok(content)
    }
}
